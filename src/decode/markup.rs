//! Structured-markup grammar.
//!
//! Recognized documents:
//! - `PrintLetterBarcodeData`: legacy printed-letter barcode, all attributes on the root.
//! - `QPDA` / `QPDB`: compact attribute sets with one-letter names.
//! - `OfflinePaperlessKyc`: `Poi` (identity) and `Poa` (address) child elements.

use roxmltree::{Document, Node};

use crate::decode::clean::{clean_text, join_address, normalize_gender, year_of};
use crate::record::{Record, Source};

pub(crate) fn parse(raw: &str) -> Option<Record> {
    let start = raw.find('<')?;
    let doc = match Document::parse(&raw[start..]) {
        Ok(doc) => doc,
        Err(e) => {
            log::debug!("markup grammar: not well-formed ({})", e);
            return None;
        }
    };
    let root = doc.root_element();
    let mut record = match root.tag_name().name() {
        "PrintLetterBarcodeData" => print_letter(root),
        "QPDA" | "QPDB" => compact(root),
        "OfflinePaperlessKyc" => paperless_kyc(root),
        other => {
            log::debug!("markup grammar: unknown root element {}", other);
            return None;
        }
    };
    if record.yob.is_empty() {
        if let Some(year) = year_of(&record.dob) {
            record.yob = year;
        }
    }
    record.gender = normalize_gender(&record.gender);
    record.clean();
    Some(record)
}

fn attr<'a>(node: Node<'a, '_>, name: &str) -> &'a str {
    node.attribute(name).unwrap_or("")
}

fn print_letter(root: Node<'_, '_>) -> Record {
    let mut record = Record::new(Source::Markup);
    record.uid = clean_text(attr(root, "uid"));
    record.name = attr(root, "name").to_string();
    record.gender = attr(root, "gender").to_string();
    record.yob = attr(root, "yob").to_string();
    record.dob = attr(root, "dob").to_string();
    record.care_of = attr(root, "co").to_string();
    record.postal_code = attr(root, "pc").to_string();
    record.state = attr(root, "state").to_string();
    record.district = attr(root, "dist").to_string();
    record.address = join_address(
        [
            "co", "house", "street", "lm", "loc", "vtc", "po", "subdist", "dist", "state", "pc",
        ]
        .into_iter()
        .map(|name| attr(root, name)),
    );
    record
}

fn compact(root: Node<'_, '_>) -> Record {
    let mut record = Record::new(Source::Markup);
    record.uid = attr(root, "u").to_string();
    record.name = attr(root, "n").to_string();
    record.gender = attr(root, "g").to_string();
    record.dob = attr(root, "d").to_string();
    record.address = join_address(attr(root, "a").split(','));
    record.mobile = attr(root, "m").to_string();
    record.email = attr(root, "e").to_string();
    record
}

fn paperless_kyc(root: Node<'_, '_>) -> Record {
    let mut record = Record::new(Source::Markup);
    record.reference_id = attr(root, "referenceId").to_string();

    if let Some(poi) = root.descendants().find(|n| n.has_tag_name("Poi")) {
        record.name = attr(poi, "name").to_string();
        record.dob = attr(poi, "dob").to_string();
        record.gender = attr(poi, "gender").to_string();
        record.email = attr(poi, "e").to_string();
        record.mobile = attr(poi, "m").to_string();
    }

    if let Some(poa) = root.descendants().find(|n| n.has_tag_name("Poa")) {
        record.care_of = attr(poa, "careof").to_string();
        record.postal_code = attr(poa, "pc").to_string();
        record.state = attr(poa, "state").to_string();
        record.district = attr(poa, "dist").to_string();
        record.address = join_address(
            [
                "careof", "house", "street", "landmark", "loc", "vtc", "po", "subdist", "dist",
                "state", "pc",
            ]
            .into_iter()
            .map(|name| attr(poa, name)),
        );
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_letter_barcode_with_leading_noise() {
        let raw = r#"QR: <?xml version="1.0" encoding="UTF-8"?> <PrintLetterBarcodeData uid="123456789012" name="Asha  Rao" gender="F" yob="1988" co="D/O: Ravi Rao" house="12" street="MG Road" lm="" loc="Camp" vtc="Pune" po="Pune City" dist="Pune" subdist="Haveli" state="Maharashtra" pc="411001"/>"#;
        let record = parse(raw).expect("markup record");
        assert_eq!(record.source, Source::Markup);
        assert_eq!(record.uid, "123456789012");
        assert_eq!(record.name, "Asha Rao");
        assert_eq!(record.gender, "Female");
        assert_eq!(record.yob, "1988");
        assert_eq!(
            record.address,
            "D/O: Ravi Rao, 12, MG Road, Camp, Pune, Pune City, Haveli, Pune, Maharashtra, 411001"
        );
        assert_eq!(record.postal_code, "411001");
    }

    #[test]
    fn garbage_prefix_is_stripped() {
        let raw = r#"scan:<QPDB u="xxxxxxxx4321" n="A" g="M" d="01-02-1991" a="Flat 3, , Lane 9"/>"#;
        let record = parse(raw).expect("compact record");
        assert_eq!(record.name, "A");
        assert_eq!(record.gender, "Male");
        assert_eq!(record.yob, "1991");
        assert_eq!(record.address, "Flat 3, Lane 9");
    }

    #[test]
    fn paperless_kyc_reads_children() {
        let raw = r#"<OfflinePaperlessKyc referenceId="43211234567890"><UidData><Poi dob="05-06-1970" gender="T" name="Kiran"/><Poa careof="C/O Devi" dist="Mysuru" house="7" pc="570001" state="Karnataka" vtc="Mysuru"/></UidData></OfflinePaperlessKyc>"#;
        let record = parse(raw).expect("kyc record");
        assert_eq!(record.reference_id, "43211234567890");
        assert_eq!(record.gender, "Transgender");
        assert_eq!(record.address, "C/O Devi, 7, Mysuru, Mysuru, Karnataka, 570001");
    }

    #[test]
    fn unknown_root_or_malformed_fails() {
        assert!(parse(r#"<Contact name="A"/>"#).is_none());
        assert!(parse(r#"<PrintLetterBarcodeData name="A""#).is_none());
        assert!(parse("no markup here").is_none());
    }
}
