//! Picks the file whose embedded timestamp is closest to a target time.

use chrono::{DateTime, NaiveDateTime};
use std::fmt::Write;

/// Timestamp layout shared by Level-II and mosaic file names.
pub const FILE_TIME_FORMAT: &str = "%Y%m%d_%H%M";

/// Offset of the timestamp in `KLSX_20240101_1200`.
pub const SITE_TIME_OFFSET: usize = 5;

/// Offset of the timestamp in `Conus_20240101_1200_N0Ronly.gif`.
pub const CONUS_TIME_OFFSET: usize = 6;

/// Parses the fixed-width timestamp at `offset` in `name` as UTC seconds.
///
/// Returns `None` when `format` has an unknown specifier.
pub fn file_time(name: &str, offset: usize, format: &str) -> Option<i64> {
    // Width of the timestamp field for this format
    let epoch = DateTime::from_timestamp(0, 0)?;
    let mut sample = String::new();
    write!(sample, "{}", epoch.format(format)).ok()?;
    let field = name.get(offset..offset + sample.len())?;
    NaiveDateTime::parse_from_str(field, format)
        .ok()
        .map(|t| t.and_utc().timestamp())
}

/// Returns the file whose timestamp has the smallest absolute distance to
/// `time`.
///
/// Files are considered in listing order and a later file only wins with a
/// strictly smaller distance, so ties go to the earliest listed file.
/// Names without a parseable timestamp are skipped.
pub fn find_nearest<'a>(
    time: i64,
    files: &'a [String],
    offset: usize,
    format: &str,
) -> Option<&'a str> {
    let mut nearest: Option<(&str, i64)> = None;
    for file in files {
        let Some(file_time) = file_time(file, offset, format) else {
            log::debug!("Skipping {} (no timestamp)", file);
            continue;
        };
        let delta = (time - file_time).abs();
        if nearest.map_or(true, |(_, best)| delta < best) {
            nearest = Some((file, delta));
        }
    }
    log::debug!("find_nearest({}) = {:?}", time, nearest);
    nearest.map(|(file, _)| file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn site_file(t: i64) -> String {
        let dt = Utc.timestamp_opt(t, 0).unwrap();
        format!("KLSX_{}", dt.format(FILE_TIME_FORMAT))
    }

    /// 2024-05-06 at `hour`:`min` UTC.
    fn may_6(hour: u32, min: u32) -> i64 {
        let dt = Utc.with_ymd_and_hms(2024, 5, 6, hour, min, 0).unwrap();
        dt.timestamp()
    }

    #[test]
    fn test_file_time() {
        let t = may_6(21, 35);
        assert_eq!(
            file_time("KLSX_20240506_2135", SITE_TIME_OFFSET, FILE_TIME_FORMAT),
            Some(t)
        );
        let conus = "Conus_20240506_2135_N0Ronly.gif";
        assert_eq!(
            file_time(conus, CONUS_TIME_OFFSET, FILE_TIME_FORMAT),
            Some(t)
        );
        assert_eq!(file_time("KLSX", SITE_TIME_OFFSET, FILE_TIME_FORMAT), None);
        assert_eq!(
            file_time("KLSX_2024xx06_2135", SITE_TIME_OFFSET, FILE_TIME_FORMAT),
            None
        );
    }

    #[test]
    fn test_bad_format_is_no_time() {
        assert_eq!(
            file_time("KLSX_20240506_2135", SITE_TIME_OFFSET, "%Q"),
            None
        );
        let files = vec!["KLSX_20240506_2135".to_string()];
        assert_eq!(find_nearest(0, &files, SITE_TIME_OFFSET, "%Q"), None);
    }

    #[test]
    fn test_smallest_delta_either_order() {
        // Minute resolution, so offsets are whole minutes
        let t = may_6(12, 0);
        let mut files = vec![
            site_file(t - 300),
            site_file(t + 600),
            site_file(t + 99_960),
        ];
        let expected = site_file(t + 600);
        let pick = |files: &[String]| {
            find_nearest(t + 300 + 60, files, SITE_TIME_OFFSET, FILE_TIME_FORMAT)
                .map(str::to_string)
        };
        assert_eq!(pick(&files), Some(expected.clone()));
        files.reverse();
        assert_eq!(pick(&files), Some(expected));
    }

    #[test]
    fn test_tie_keeps_first_listed() {
        let t = may_6(12, 0);
        let files = vec![site_file(t + 60), site_file(t - 60)];
        assert_eq!(
            find_nearest(t, &files, SITE_TIME_OFFSET, FILE_TIME_FORMAT),
            Some(files[0].as_str())
        );
    }

    #[test]
    fn test_no_candidates() {
        let files = vec!["dir.list".to_string()];
        assert_eq!(
            find_nearest(0, &files, SITE_TIME_OFFSET, FILE_TIME_FORMAT),
            None
        );
        assert_eq!(
            find_nearest(0, &[], SITE_TIME_OFFSET, FILE_TIME_FORMAT),
            None
        );
    }
}
