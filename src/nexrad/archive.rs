//! Archive II (Level-II) volume files.
//!
//! A volume file is a 24 byte volume header followed by LDM records. Each
//! record is a 4 byte big-endian signed length and a bzip2 stream. Once
//! decompressed the records hold a sequence of messages, each preceded by
//! a 12 byte CTM header. Message 31 carries one radial with generic moment
//! blocks; every other message type occupies a fixed 2432 byte slot.

use super::model::{Product, Radar, Ray, Sweep, Volume, BADVAL, RFVAL};
use crate::data::get_site;
use crate::error::DecodeError;
use bzip2::read::BzDecoder;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;

const VOLUME_HEADER_LEN: usize = 24;
const CTM_LEN: usize = 12;
const MESSAGE_HEADER_LEN: usize = 16;
const FIXED_MESSAGE_LEN: usize = 2432;
const DIGITAL_RADAR_DATA: u8 = 31;

/// Turns a compressed volume file into an uncompressed one.
pub trait DecompressFilter: Send + Sync {
    fn decompress(&self, input: &Path, output: &Path) -> Result<(), DecodeError>;
}

/// Built-in bzip2 record decompressor.
#[derive(Debug, Default, Clone, Copy)]
pub struct Bzip2Filter;

impl DecompressFilter for Bzip2Filter {
    fn decompress(&self, input: &Path, output: &Path) -> Result<(), DecodeError> {
        decompress(input, output)
    }
}

/// Runs an external program as `<program> <input> <output>`.
#[derive(Debug, Clone)]
pub struct CommandFilter {
    program: String,
}

impl CommandFilter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl DecompressFilter for CommandFilter {
    fn decompress(&self, input: &Path, output: &Path) -> Result<(), DecodeError> {
        log::debug!(
            "Running {} {} {}",
            self.program,
            input.display(),
            output.display()
        );
        let status = Command::new(&self.program).args([input, output]).status()?;
        if status.success() {
            Ok(())
        } else {
            Err(DecodeError::Command {
                command: self.program.clone(),
                status: status.to_string(),
            })
        }
    }
}

/// Decompresses `input` into `output`.
///
/// The volume header is copied, then every LDM record is decompressed in
/// order. Input that is not bzip2 compressed is copied verbatim.
pub fn decompress(input: &Path, output: &Path) -> Result<(), DecodeError> {
    let data = fs::read(input)?;
    let out = decompress_bytes(&data)?;
    fs::write(output, out)?;
    Ok(())
}

fn is_compressed(data: &[u8]) -> bool {
    data.len() >= VOLUME_HEADER_LEN + 7
        && &data[VOLUME_HEADER_LEN + 4..VOLUME_HEADER_LEN + 7] == b"BZh"
}

fn decompress_bytes(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if !is_compressed(data) {
        return Ok(data.to_vec());
    }
    let mut out = Vec::with_capacity(data.len() * 8);
    out.extend_from_slice(&data[..VOLUME_HEADER_LEN]);

    let mut pos = VOLUME_HEADER_LEN;
    let mut records = 0;
    while pos + 4 <= data.len() {
        let size = be_i32(data, pos)?.unsigned_abs() as usize;
        pos += 4;
        if size == 0 {
            break;
        }
        let record = data
            .get(pos..pos + size)
            .ok_or_else(|| DecodeError::Truncated(format!("LDM record {}", records)))?;
        BzDecoder::new(record).read_to_end(&mut out)?;
        pos += size;
        records += 1;
    }
    log::debug!("Decompressed {} LDM record(s)", records);
    Ok(out)
}

fn field<'a>(data: &'a [u8], pos: usize, len: usize, what: &str) -> Result<&'a [u8], DecodeError> {
    data.get(pos..pos + len)
        .ok_or_else(|| DecodeError::Truncated(format!("{} at {}", what, pos)))
}

fn be_u16(data: &[u8], pos: usize) -> Result<u16, DecodeError> {
    let b = field(data, pos, 2, "u16")?;
    Ok(u16::from_be_bytes([b[0], b[1]]))
}

fn be_i16(data: &[u8], pos: usize) -> Result<i16, DecodeError> {
    Ok(be_u16(data, pos)? as i16)
}

fn be_u32(data: &[u8], pos: usize) -> Result<u32, DecodeError> {
    let b = field(data, pos, 4, "u32")?;
    Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn be_i32(data: &[u8], pos: usize) -> Result<i32, DecodeError> {
    Ok(be_u32(data, pos)? as i32)
}

fn be_f32(data: &[u8], pos: usize) -> Result<f32, DecodeError> {
    Ok(f32::from_bits(be_u32(data, pos)?))
}

/// Site position from the RVOL block.
struct SitePosition {
    lat: f64,
    lon: f64,
    height_m: f64,
}

/// One moment of one radial.
struct Moment {
    product: Product,
    first_gate_m: f32,
    gate_size_m: f32,
    bins: Vec<u8>,
}

/// One decoded message 31.
struct Radial {
    timestamp: i64,
    azimuth: f32,
    beam_width: f32,
    elevation_number: u8,
    elevation: f32,
    site: Option<SitePosition>,
    moments: Vec<Moment>,
}

/// Julian date (1 = 1970-01-01) and milliseconds of day to Unix seconds.
fn unix_time(julian_date: u32, millis: u32) -> i64 {
    (julian_date as i64 - 1) * 86_400 + millis as i64 / 1000
}

fn parse_moment(block: &[u8], product: Product) -> Result<Moment, DecodeError> {
    let gates = be_u16(block, 8)? as usize;
    let first_gate_m = be_u16(block, 10)? as f32;
    let gate_size_m = be_u16(block, 12)? as f32;
    let word_size = block.get(19).copied().unwrap_or(8);
    let scale = be_f32(block, 20)?;
    let offset = be_f32(block, 24)?;

    let width = match word_size {
        8 => 1,
        16 => 2,
        other => {
            return Err(DecodeError::Invalid(format!(
                "{} word size {}",
                product, other
            )));
        }
    };
    let raw = field(block, 28, gates * width, "moment data")?;
    let bins = raw
        .chunks_exact(width)
        .map(|w| {
            let value = if width == 1 {
                w[0] as u16
            } else {
                u16::from_be_bytes([w[0], w[1]])
            };
            match value {
                0 => BADVAL,
                1 => RFVAL,
                _ if scale == 0.0 => BADVAL,
                v => product.encode((v as f32 - offset) / scale),
            }
        })
        .collect();

    Ok(Moment {
        product,
        first_gate_m,
        gate_size_m,
        bins,
    })
}

fn parse_radial(body: &[u8]) -> Result<Radial, DecodeError> {
    let millis = be_u32(body, 4)?;
    let julian_date = be_u16(body, 8)? as u32;
    let azimuth = be_f32(body, 12)?;
    let resolution = field(body, 20, 1, "azimuth resolution")?[0];
    let elevation_number = field(body, 22, 1, "elevation number")?[0];
    let elevation = be_f32(body, 24)?;
    let block_count = be_u16(body, 30)? as usize;

    let mut radial = Radial {
        timestamp: unix_time(julian_date, millis),
        azimuth,
        beam_width: if resolution == 1 { 0.5 } else { 1.0 },
        elevation_number,
        elevation,
        site: None,
        moments: Vec::new(),
    };

    for i in 0..block_count.min(10) {
        let pointer = be_u32(body, 32 + i * 4)? as usize;
        if pointer == 0 {
            continue;
        }
        let block = body
            .get(pointer..)
            .ok_or_else(|| DecodeError::Truncated(format!("data block {}", i)))?;
        let kind = field(block, 0, 4, "block name")?;
        match (kind[0], &kind[1..4]) {
            (b'R', b"VOL") => {
                radial.site = Some(SitePosition {
                    lat: be_f32(block, 8)? as f64,
                    lon: be_f32(block, 12)? as f64,
                    height_m: be_i16(block, 16)? as f64 + be_u16(block, 18)? as f64,
                });
            }
            (b'D', name) => {
                if let Some(product) = Product::from_moment_name(name) {
                    radial.moments.push(parse_moment(block, product)?);
                }
            }
            _ => {}
        }
    }
    Ok(radial)
}

/// Walks the messages of an uncompressed volume and returns its radials.
fn parse_radials(data: &[u8]) -> Result<Vec<Radial>, DecodeError> {
    let mut pos = if data.starts_with(b"AR2V") {
        VOLUME_HEADER_LEN
    } else {
        0
    };
    let mut radials = Vec::new();
    while pos + CTM_LEN + MESSAGE_HEADER_LEN <= data.len() {
        let header = pos + CTM_LEN;
        let size = be_u16(data, header)? as usize * 2;
        let kind = data[header + 3];
        if kind == DIGITAL_RADAR_DATA {
            if size < MESSAGE_HEADER_LEN {
                return Err(DecodeError::Invalid(format!("message 31 size {}", size)));
            }
            let body = field(
                data,
                header + MESSAGE_HEADER_LEN,
                size - MESSAGE_HEADER_LEN,
                "message 31",
            )?;
            radials.push(parse_radial(body)?);
            pos = header + size;
        } else {
            pos += FIXED_MESSAGE_LEN;
        }
    }
    Ok(radials)
}

/// Nominal elevation of a sweep, from the mean of its rays.
fn nominal_elevation(rays: &[Ray]) -> f32 {
    if rays.is_empty() {
        return 0.0;
    }
    let mean = rays.iter().map(|r| r.elevation).sum::<f32>() / rays.len() as f32;
    (mean * 10.0).round() / 10.0
}

/// Groups radials into per-product volumes of per-elevation sweeps.
fn build_radar(site_code: &str, radials: Vec<Radial>) -> Result<Radar, DecodeError> {
    if radials.is_empty() {
        return Err(DecodeError::Invalid("no radials".to_string()));
    }

    let position = radials
        .iter()
        .find_map(|r| r.site.as_ref())
        .map(|p| (p.lat, p.lon, p.height_m))
        .or_else(|| get_site(site_code).map(|s| (s.lat, s.lon, s.elev)))
        .unwrap_or((0.0, 0.0, 0.0));
    let timestamp = radials[0].timestamp;

    // Elevation numbers in the order they were scanned
    let mut cuts: Vec<u8> = Vec::new();
    for radial in &radials {
        if !cuts.contains(&radial.elevation_number) {
            cuts.push(radial.elevation_number);
        }
    }

    let mut volumes = Vec::new();
    for &product in Product::all() {
        let mut volume = Volume::new(product);
        for &cut in &cuts {
            let rays: Vec<Ray> = radials
                .iter()
                .filter(|r| r.elevation_number == cut)
                .filter_map(|r| {
                    r.moments
                        .iter()
                        .find(|m| m.product == product)
                        .map(|m| Ray {
                            azimuth: r.azimuth,
                            beam_width: r.beam_width,
                            first_gate_m: m.first_gate_m,
                            gate_size_m: m.gate_size_m,
                            elevation: r.elevation,
                            bins: m.bins.clone(),
                        })
                })
                .collect();
            if !rays.is_empty() {
                volume.sweeps.push(Sweep::new(nominal_elevation(&rays), rays));
            }
        }
        if !volume.sweeps.is_empty() {
            volumes.push(volume);
        }
    }

    log::debug!(
        "{}: {} radial(s), {} cut(s), {} product(s)",
        site_code,
        radials.len(),
        cuts.len(),
        volumes.len()
    );

    Ok(Radar {
        site_id: site_code.to_uppercase(),
        lat: position.0,
        lon: position.1,
        height_m: position.2,
        timestamp,
        volumes,
    })
}

/// Decodes an Archive II file into a [`Radar`].
///
/// Compressed input is decompressed in memory first.
pub fn decode_volume_file(path: &Path, site_code: &str) -> Result<Radar, DecodeError> {
    let data = fs::read(path)?;
    let data = decompress_bytes(&data)?;
    build_radar(site_code, parse_radials(&data)?)
}

/// Turns a fetched file into a [`Radar`].
pub trait VolumeDecoder: Send + Sync {
    fn decode(&self, path: &Path, site_code: &str) -> Result<Radar, DecodeError>;
}

/// Decompresses through a [`DecompressFilter`] into `<file>.raw`, then
/// decodes the raw file.
pub struct ArchiveDecoder {
    filter: Box<dyn DecompressFilter>,
}

impl Default for ArchiveDecoder {
    fn default() -> Self {
        Self::new(Box::new(Bzip2Filter))
    }
}

impl ArchiveDecoder {
    pub fn new(filter: Box<dyn DecompressFilter>) -> Self {
        Self { filter }
    }

    /// Uses `command` as the filter when set, the built-in one otherwise.
    pub fn from_command(command: Option<&str>) -> Self {
        match command {
            Some(program) => Self::new(Box::new(CommandFilter::new(program))),
            None => Self::default(),
        }
    }

    /// Path of the raw file, decompressing only when it is missing or older
    /// than `path`.
    ///
    /// The filter writes to `<file>.raw.part`, which only becomes the raw
    /// file once the filter succeeds.
    pub fn raw_file(&self, path: &Path) -> Result<PathBuf, DecodeError> {
        let raw = with_suffix(path, ".raw");
        let source_time = fs::metadata(path)?.modified()?;
        let fresh = fs::metadata(&raw)
            .and_then(|m| m.modified())
            .map(|raw_time| raw_time >= source_time)
            .unwrap_or(false);
        if fresh {
            log::debug!("Reusing {}", raw.display());
            return Ok(raw);
        }

        let partial = with_suffix(path, ".raw.part");
        if let Err(e) = self.filter.decompress(path, &partial) {
            if let Err(remove_err) = fs::remove_file(&partial) {
                log::debug!("No partial output to remove: {}", remove_err);
            }
            return Err(e);
        }
        fs::rename(&partial, &raw)?;
        Ok(raw)
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

impl VolumeDecoder for ArchiveDecoder {
    fn decode(&self, path: &Path, site_code: &str) -> Result<Radar, DecodeError> {
        let raw = self.raw_file(path)?;
        decode_volume_file(&raw, site_code)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bzip2::write::BzEncoder;
    use bzip2::Compression;
    use std::io::Write;

    fn push_u16(out: &mut Vec<u8>, v: u16) {
        out.extend_from_slice(&v.to_be_bytes());
    }

    fn push_u32(out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&v.to_be_bytes());
    }

    fn push_f32(out: &mut Vec<u8>, v: f32) {
        out.extend_from_slice(&v.to_be_bytes());
    }

    fn volume_block() -> Vec<u8> {
        let mut b = b"RVOL".to_vec();
        push_u16(&mut b, 44);
        b.extend_from_slice(&[1, 0]);
        push_f32(&mut b, 38.5);
        push_f32(&mut b, -90.5);
        push_u16(&mut b, 180);
        push_u16(&mut b, 20);
        b.resize(44, 0);
        b
    }

    fn moment_block(name: &[u8; 3], raw: &[u8], scale: f32, offset: f32) -> Vec<u8> {
        let mut b = vec![b'D'];
        b.extend_from_slice(name);
        push_u32(&mut b, 0);
        push_u16(&mut b, raw.len() as u16);
        push_u16(&mut b, 2125);
        push_u16(&mut b, 250);
        push_u16(&mut b, 0);
        push_u16(&mut b, 0);
        b.push(0);
        b.push(8);
        push_f32(&mut b, scale);
        push_f32(&mut b, offset);
        b.extend_from_slice(raw);
        b
    }

    /// A message 31 with CTM header: one RVOL and one REF block.
    pub(crate) fn message31(azimuth: f32, elevation_number: u8, elevation: f32) -> Vec<u8> {
        let blocks = [
            volume_block(),
            moment_block(b"REF", &[0, 1, 2, 66, 130], 2.0, 66.0),
        ];

        let mut body = b"KLSX".to_vec();
        push_u32(&mut body, 43_200_000);
        push_u16(&mut body, 19_850);
        push_u16(&mut body, 1);
        push_f32(&mut body, azimuth);
        body.extend_from_slice(&[0, 0]);
        push_u16(&mut body, 0);
        body.push(2); // 1 degree spacing
        body.push(1);
        body.push(elevation_number);
        body.push(0);
        push_f32(&mut body, elevation);
        body.extend_from_slice(&[0, 0]);
        push_u16(&mut body, blocks.len() as u16);

        let mut pointer = body.len() + blocks.len() * 4;
        for block in &blocks {
            push_u32(&mut body, pointer as u32);
            pointer += block.len();
        }
        for block in &blocks {
            body.extend_from_slice(block);
        }
        if body.len() % 2 == 1 {
            body.push(0);
        }

        let mut msg = vec![0u8; CTM_LEN];
        push_u16(&mut msg, ((MESSAGE_HEADER_LEN + body.len()) / 2) as u16);
        msg.push(0);
        msg.push(DIGITAL_RADAR_DATA);
        msg.resize(CTM_LEN + MESSAGE_HEADER_LEN, 0);
        msg.extend_from_slice(&body);
        msg
    }

    /// A fixed-size message of another type.
    fn filler_message() -> Vec<u8> {
        let mut msg = vec![0u8; CTM_LEN];
        push_u16(&mut msg, 1208);
        msg.push(0);
        msg.push(2);
        msg.resize(FIXED_MESSAGE_LEN, 0);
        msg
    }

    fn volume_header() -> Vec<u8> {
        let mut header = b"AR2V0006.001".to_vec();
        push_u32(&mut header, 19_850);
        push_u32(&mut header, 43_200_000);
        header.extend_from_slice(b"KLSX");
        header
    }

    /// Uncompressed body: filler, then two cuts of two radials each.
    pub(crate) fn raw_messages() -> Vec<u8> {
        let mut data = filler_message();
        data.extend(message31(0.5, 1, 0.48));
        data.extend(message31(1.5, 1, 0.52));
        data.extend(message31(0.5, 2, 1.45));
        data.extend(message31(1.5, 2, 1.47));
        data
    }

    fn bz(data: &[u8]) -> Vec<u8> {
        let mut encoder = BzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    /// Full compressed volume file split across two LDM records.
    pub(crate) fn compressed_volume() -> Vec<u8> {
        let messages = raw_messages();
        let split = FIXED_MESSAGE_LEN;
        let mut out = volume_header();
        for (i, part) in [&messages[..split], &messages[split..]].iter().enumerate() {
            let record = bz(part);
            let len = record.len() as i32;
            let len = if i == 1 { -len } else { len };
            out.extend_from_slice(&len.to_be_bytes());
            out.extend(record);
        }
        out
    }

    #[test]
    fn test_decompress_restores_messages() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("KLSX_20240506_1200");
        let output = dir.path().join("KLSX_20240506_1200.raw");
        fs::write(&input, compressed_volume()).unwrap();

        decompress(&input, &output).unwrap();
        let raw = fs::read(&output).unwrap();
        assert_eq!(&raw[..VOLUME_HEADER_LEN], &volume_header()[..]);
        assert_eq!(&raw[VOLUME_HEADER_LEN..], &raw_messages()[..]);

        // Already uncompressed data passes through unchanged
        let again = dir.path().join("again.raw");
        decompress(&output, &again).unwrap();
        assert_eq!(fs::read(&again).unwrap(), raw);
    }

    #[test]
    fn test_decode_volume() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("KLSX_20240506_1200");
        fs::write(&path, compressed_volume()).unwrap();

        let radar = decode_volume_file(&path, "klsx").unwrap();
        assert_eq!(radar.site_id, "KLSX");
        assert!((radar.lat - 38.5).abs() < 1e-6);
        assert!((radar.lon + 90.5).abs() < 1e-6);
        assert_eq!(radar.height_m, 200.0);
        assert_eq!(radar.timestamp, 19_849 * 86_400 + 43_200);

        let products: Vec<_> = radar.products().collect();
        assert_eq!(products, vec![Product::Reflectivity]);

        let volume = radar.volume(Product::Reflectivity).unwrap();
        assert_eq!(volume.elevations(), vec![0.5, 1.5]);
        let sweep = &volume.sweeps[0];
        assert_eq!(sweep.ray_count(), 2);
        let ray = &sweep.rays[0];
        assert_eq!(ray.beam_width, 1.0);
        assert_eq!(ray.first_gate_m, 2125.0);
        assert_eq!(ray.gate_size_m, 250.0);
        // raw 2 -> -32 dBZ clamps to the lowest data code
        assert_eq!(ray.bins, vec![BADVAL, RFVAL, 1, 1, 32]);
    }

    #[test]
    fn test_truncated_message() {
        let mut data = volume_header();
        let msg = message31(0.5, 1, 0.5);
        data.extend_from_slice(&msg[..msg.len() - 10]);
        assert!(matches!(
            parse_radials(&data),
            Err(DecodeError::Truncated(_))
        ));
        assert!(matches!(
            build_radar("KLSX", Vec::new()),
            Err(DecodeError::Invalid(_))
        ));
    }

    #[test]
    fn test_raw_file_reuse() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        struct Counting(Arc<AtomicUsize>);
        impl DecompressFilter for Counting {
            fn decompress(&self, input: &Path, output: &Path) -> Result<(), DecodeError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                decompress(input, output)
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("KLSX_20240506_1200");
        fs::write(&path, compressed_volume()).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let decoder = ArchiveDecoder::new(Box::new(Counting(calls.clone())));
        decoder.decode(&path, "KLSX").unwrap();
        decoder.decode(&path, "KLSX").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(dir.path().join("KLSX_20240506_1200.raw").exists());
    }

    #[test]
    fn test_command_filter_failure() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        fs::write(&input, b"x").unwrap();
        let filter = CommandFilter::new("false");
        let err = filter
            .decompress(&input, &dir.path().join("out"))
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Command { .. } | DecodeError::Io(_)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_filter_leaves_no_raw_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("KLSX_20240506_1200");
        fs::write(&path, compressed_volume()).unwrap();

        // Writes some output, then fails
        let script = dir.path().join("broken-filter");
        fs::write(&script, "#!/bin/sh\necho partial > \"$2\"\nexit 1\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let broken = ArchiveDecoder::from_command(script.to_str());
        let err = broken.decode(&path, "KLSX").unwrap_err();
        assert!(matches!(err, DecodeError::Command { .. }));
        assert!(!dir.path().join("KLSX_20240506_1200.raw").exists());
        assert!(!dir.path().join("KLSX_20240506_1200.raw.part").exists());

        // The next attempt decompresses again instead of reusing the failure
        let radar = ArchiveDecoder::default().decode(&path, "KLSX").unwrap();
        assert_eq!(radar.site_id, "KLSX");
    }
}
