//! Numeric secure-payload grammar.
//!
//! The payload is a decimal rendering of a big-endian integer whose bytes are
//! a deflate stream. Inflated, it holds Latin-1 text fields separated by
//! `0xFF`, followed by opaque trailing data (photo, signature) that is ignored.

use num_bigint::BigUint;
use zeroize::Zeroizing;

use crate::decode::clean::{clean_text, join_address, normalize_gender, year_of};
use crate::record::{Record, Source};
use crate::ScanError;

/// Shortest digit string considered a secure payload.
pub const MIN_SECURE_DIGITS: usize = 50;

/// Number of leading text fields in an inflated payload.
pub const SECURE_FIELD_COUNT: usize = 16;

const FIELD_DELIMITER: u8 = 0xFF;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Stream decompression capability.
///
/// Builds without the `inflate` feature have none, and numeric secure payloads
/// are then reported as `DecodeCapabilityMissing` instead of a parse failure.
pub trait Inflater: Send {
    /// Implementation identifier.
    fn name(&self) -> &'static str;

    /// Inflate a raw deflate stream.
    fn inflate(&self, compressed: &[u8]) -> std::io::Result<Vec<u8>>;
}

/// flate2-backed inflater. Accepts raw deflate and gzip-framed streams.
#[cfg(feature = "inflate")]
#[derive(Clone, Copy, Debug, Default)]
pub struct FlateInflater;

#[cfg(feature = "inflate")]
impl Inflater for FlateInflater {
    fn name(&self) -> &'static str {
        "flate2"
    }

    fn inflate(&self, compressed: &[u8]) -> std::io::Result<Vec<u8>> {
        use flate2::read::{DeflateDecoder, GzDecoder};
        use std::io::Read;

        let mut out = Vec::new();
        if compressed.starts_with(&GZIP_MAGIC) {
            GzDecoder::new(compressed).read_to_end(&mut out)?;
        } else {
            DeflateDecoder::new(compressed).read_to_end(&mut out)?;
        }
        Ok(out)
    }
}

/// The digit string of a secure payload, whitespace removed, if `raw` is one.
pub fn secure_digits(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() >= MIN_SECURE_DIGITS && digits.bytes().all(|b| b.is_ascii_digit()) {
        Some(digits)
    } else {
        None
    }
}

/// Minimal big-endian bytes of `value`. Zero is a single zero byte.
pub fn to_be_bytes_minimal(value: &BigUint) -> Vec<u8> {
    if value.bits() == 0 {
        return vec![0];
    }
    value.to_bytes_be()
}

pub(crate) fn parse(raw: &str, inflater: Option<&dyn Inflater>) -> Result<Option<Record>, ScanError> {
    let Some(digits) = secure_digits(raw) else {
        return Ok(None);
    };
    let Some(value) = BigUint::parse_bytes(digits.as_bytes(), 10) else {
        return Ok(None);
    };
    let compressed = Zeroizing::new(to_be_bytes_minimal(&value));

    let Some(inflater) = inflater else {
        log::warn!(
            "secure payload ({} digits) detected but no inflater is available",
            digits.len()
        );
        return Err(ScanError::DecodeCapabilityMissing);
    };

    let inflated = match inflater.inflate(&compressed) {
        Ok(bytes) => Zeroizing::new(bytes),
        Err(e) => {
            log::debug!("secure grammar: {} inflate failed ({})", inflater.name(), e);
            return Ok(None);
        }
    };

    let Some(fields) = split_fields(&inflated) else {
        log::debug!("secure grammar: fewer than {} fields", SECURE_FIELD_COUNT);
        return Ok(None);
    };
    Ok(map_fields(&fields))
}

/// Split on `0xFF`, stopping at the last expected delimiter.
fn split_fields(bytes: &[u8]) -> Option<Vec<String>> {
    let mut fields = Vec::with_capacity(SECURE_FIELD_COUNT);
    let mut start = 0;
    for (index, byte) in bytes.iter().enumerate() {
        if *byte != FIELD_DELIMITER {
            continue;
        }
        fields.push(clean_text(&latin1(&bytes[start..index])));
        start = index + 1;
        if fields.len() == SECURE_FIELD_COUNT {
            return Some(fields);
        }
    }
    None
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn map_fields(fields: &[String]) -> Option<Record> {
    let [
        indicator,
        reference_id,
        name,
        dob,
        gender,
        care_of,
        district,
        landmark,
        house,
        location,
        postal_code,
        post_office,
        state,
        street,
        sub_district,
        vtc,
    ] = fields
    else {
        return None;
    };
    if indicator.is_empty() || reference_id.is_empty() {
        return None;
    }
    log::debug!("secure grammar: format indicator {}", indicator);

    let mut record = Record::new(Source::SecureQr);
    record.reference_id = reference_id.clone();
    record.name = name.clone();
    record.dob = dob.clone();
    record.yob = year_of(dob).unwrap_or_default();
    record.gender = normalize_gender(gender);
    record.care_of = care_of.clone();
    record.district = district.clone();
    record.postal_code = postal_code.clone();
    record.state = state.clone();
    record.address = join_address([
        care_of.as_str(),
        house.as_str(),
        street.as_str(),
        landmark.as_str(),
        location.as_str(),
        vtc.as_str(),
        sub_district.as_str(),
        district.as_str(),
        state.as_str(),
        postal_code.as_str(),
        post_office.as_str(),
    ]);
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_a_single_byte() {
        assert_eq!(to_be_bytes_minimal(&BigUint::from(0u32)), vec![0]);
        assert_eq!(to_be_bytes_minimal(&BigUint::from(255u32)), vec![0xFF]);
        assert_eq!(to_be_bytes_minimal(&BigUint::from(256u32)), vec![1, 0]);
    }

    #[test]
    fn big_values_round_trip_through_bytes() {
        let digits = "9".repeat(120);
        let value = BigUint::parse_bytes(digits.as_bytes(), 10).unwrap();
        let bytes = to_be_bytes_minimal(&value);
        assert_ne!(bytes[0], 0);
        assert_eq!(BigUint::from_bytes_be(&bytes), value);
    }

    #[test]
    fn short_digit_strings_are_not_secure_payloads() {
        assert_eq!(secure_digits(&"1".repeat(40)), None);
        assert_eq!(secure_digits(&"1".repeat(49)), None);
        assert!(secure_digits(&"1".repeat(50)).is_some());
        let spaced = format!("{} {}\n", "1".repeat(25), "2".repeat(25));
        assert_eq!(secure_digits(&spaced).map(|d| d.len()), Some(50));
        assert_eq!(secure_digits(&format!("{}a", "1".repeat(60))), None);
    }

    #[test]
    fn missing_inflater_is_a_capability_gap() {
        let raw = "7".repeat(80);
        assert_eq!(parse(&raw, None), Err(ScanError::DecodeCapabilityMissing));
        assert_eq!(parse(&"7".repeat(40), None), Ok(None));
    }

    #[test]
    fn split_requires_sixteen_delimiters() {
        let mut bytes = Vec::new();
        for i in 0..15 {
            bytes.extend_from_slice(format!("f{}", i).as_bytes());
            bytes.push(FIELD_DELIMITER);
        }
        bytes.extend_from_slice(b"trailing");
        assert!(split_fields(&bytes).is_none());

        bytes.push(FIELD_DELIMITER);
        bytes.extend_from_slice(&[0xFF, 0x00, 0xFF]);
        let fields = split_fields(&bytes).expect("sixteen fields");
        assert_eq!(fields.len(), SECURE_FIELD_COUNT);
        assert_eq!(fields[15], "trailing");
    }

    #[test]
    fn latin1_maps_high_bytes() {
        assert_eq!(latin1(&[0x4A, 0xE9, 0x20, 0x41]), "Jé A");
    }

    #[cfg(feature = "inflate")]
    mod inflate {
        use super::super::*;
        use flate2::write::DeflateEncoder;
        use flate2::Compression;
        use std::io::Write;

        fn encode(fields: &[&str], trailer: &[u8]) -> String {
            let mut body = Vec::new();
            for field in fields {
                body.extend_from_slice(field.as_bytes());
                body.push(FIELD_DELIMITER);
            }
            body.extend_from_slice(trailer);
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&body).unwrap();
            let compressed = encoder.finish().unwrap();
            BigUint::from_bytes_be(&compressed).to_str_radix(10)
        }

        const FIELDS: [&str; 16] = [
            "2",
            "432120190101120000",
            "Meera  Iyer",
            "14-03-1985",
            "F",
            "W/O Arun",
            "Chennai",
            "Near Temple",
            "4B",
            "T Nagar",
            "600017",
            "T Nagar",
            "Tamil Nadu",
            "North Usman Rd",
            "",
            "Chennai",
        ];

        #[test]
        fn decodes_secure_payload() {
            let raw = encode(&FIELDS, b"\x89PNG-photo-bytes-and-signature");
            let record = parse(&raw, Some(&FlateInflater))
                .expect("no capability gap")
                .expect("secure record");

            assert_eq!(record.source, Source::SecureQr);
            assert_eq!(record.reference_id, "432120190101120000");
            assert_eq!(record.name, "Meera Iyer");
            assert_eq!(record.dob, "14-03-1985");
            assert_eq!(record.yob, "1985");
            assert_eq!(record.gender, "Female");
            assert_eq!(
                record.address,
                "W/O Arun, 4B, North Usman Rd, Near Temple, T Nagar, Chennai, Chennai, Tamil Nadu, 600017, T Nagar"
            );
        }

        #[test]
        fn empty_reference_id_is_rejected() {
            let mut fields = FIELDS;
            fields[1] = "  ";
            let raw = encode(&fields, b"");
            assert_eq!(parse(&raw, Some(&FlateInflater)), Ok(None));
        }

        #[test]
        fn corrupt_stream_is_not_this_format() {
            // BTYPE=11 in the first block header is reserved.
            let mut bytes = vec![0x07];
            bytes.extend((1u8..40).collect::<Vec<_>>());
            let raw = BigUint::from_bytes_be(&bytes).to_str_radix(10);
            assert!(raw.len() >= MIN_SECURE_DIGITS);
            assert_eq!(parse(&raw, Some(&FlateInflater)), Ok(None));
        }
    }
}
