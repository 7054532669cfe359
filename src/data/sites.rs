//! NEXRAD WSR-88D site registry.

/// Static definition of one radar site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NexradSite {
    /// Four-letter ICAO identifier
    pub id: &'static str,
    /// Nearby city used as the display name
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
    /// Tower base elevation in metres
    pub elev: f64,
}

macro_rules! site {
    ($id:literal, $name:literal, $lat:literal, $lon:literal, $elev:literal) => {
        NexradSite {
            id: $id,
            name: $name,
            lat: $lat,
            lon: $lon,
            elev: $elev,
        }
    };
}

pub static NEXRAD_SITES: &[NexradSite] = &[
    site!("KABR", "Aberdeen, SD", 45.456, -98.413, 397.0),
    site!("KABX", "Albuquerque, NM", 35.150, -106.824, 1789.0),
    site!("KAKQ", "Wakefield, VA", 36.984, -77.007, 34.0),
    site!("KAMA", "Amarillo, TX", 35.233, -101.709, 1093.0),
    site!("KAMX", "Miami, FL", 25.611, -80.413, 4.0),
    site!("KAPX", "Gaylord, MI", 44.907, -84.720, 446.0),
    site!("KARX", "La Crosse, WI", 43.823, -91.191, 389.0),
    site!("KATX", "Seattle, WA", 48.195, -122.496, 151.0),
    site!("KBGM", "Binghamton, NY", 42.200, -75.985, 490.0),
    site!("KBMX", "Birmingham, AL", 33.172, -86.770, 197.0),
    site!("KBOX", "Boston, MA", 41.956, -71.137, 36.0),
    site!("KBUF", "Buffalo, NY", 42.949, -78.737, 211.0),
    site!("KCLE", "Cleveland, OH", 41.413, -81.860, 233.0),
    site!("KCYS", "Cheyenne, WY", 41.152, -104.806, 1868.0),
    site!("KDAX", "Sacramento, CA", 38.501, -121.678, 9.0),
    site!("KDDC", "Dodge City, KS", 37.761, -99.969, 789.0),
    site!("KDIX", "Philadelphia, PA", 39.947, -74.411, 45.0),
    site!("KDMX", "Des Moines, IA", 41.731, -93.723, 299.0),
    site!("KDTX", "Detroit, MI", 42.700, -83.472, 327.0),
    site!("KEAX", "Kansas City, MO", 38.810, -94.264, 303.0),
    site!("KEWX", "Austin/San Antonio, TX", 29.704, -98.028, 193.0),
    site!("KFFC", "Atlanta, GA", 33.364, -84.566, 262.0),
    site!("KFSD", "Sioux Falls, SD", 43.588, -96.729, 436.0),
    site!("KFTG", "Denver, CO", 39.786, -104.546, 1675.0),
    site!("KFWS", "Dallas/Fort Worth, TX", 32.573, -97.303, 208.0),
    site!("KGLD", "Goodland, KS", 39.367, -101.700, 1113.0),
    site!("KGRR", "Grand Rapids, MI", 42.894, -85.545, 237.0),
    site!("KHGX", "Houston, TX", 29.472, -95.079, 5.0),
    site!("KICT", "Wichita, KS", 37.655, -97.443, 407.0),
    site!("KILN", "Cincinnati, OH", 39.420, -83.822, 322.0),
    site!("KILX", "Lincoln, IL", 40.151, -89.337, 177.0),
    site!("KIND", "Indianapolis, IN", 39.708, -86.280, 241.0),
    site!("KINX", "Tulsa, OK", 36.175, -95.564, 204.0),
    site!("KJAX", "Jacksonville, FL", 30.485, -81.702, 10.0),
    site!("KLIX", "New Orleans, LA", 30.337, -89.826, 7.0),
    site!("KLOT", "Chicago, IL", 41.605, -88.085, 202.0),
    site!("KLSX", "St. Louis, MO", 38.699, -90.683, 185.0),
    site!("KLWX", "Sterling, VA", 38.976, -77.487, 83.0),
    site!("KMKX", "Milwaukee, WI", 42.968, -88.551, 292.0),
    site!("KMPX", "Minneapolis, MN", 44.849, -93.566, 288.0),
    site!("KNKX", "San Diego, CA", 32.919, -117.042, 291.0),
    site!("KOKX", "New York City, NY", 40.866, -72.864, 26.0),
    site!("KPBZ", "Pittsburgh, PA", 40.532, -80.218, 361.0),
    site!("KPHX", "Phoenix, AZ", 33.421, -111.886, 402.0),
    site!("KRAX", "Raleigh, NC", 35.666, -78.490, 106.0),
    site!("KRTX", "Portland, OR", 45.715, -122.965, 479.0),
    site!("KSGF", "Springfield, MO", 37.235, -93.400, 390.0),
    site!("KSHV", "Shreveport, LA", 32.451, -93.841, 83.0),
    site!("KSOX", "Santa Ana Mountains, CA", 33.818, -117.636, 923.0),
    site!("KTBW", "Tampa Bay, FL", 27.705, -82.402, 12.0),
    site!("KTLX", "Oklahoma City, OK", 35.333, -97.278, 370.0),
    site!("KVNX", "Vance AFB, OK", 36.741, -98.128, 369.0),
    site!("KVTX", "Los Angeles, CA", 34.412, -119.179, 831.0),
];

/// Looks up a site by identifier, case-insensitively.
pub fn get_site(id: &str) -> Option<&'static NexradSite> {
    NEXRAD_SITES
        .iter()
        .find(|site| site.id.eq_ignore_ascii_case(id))
}
