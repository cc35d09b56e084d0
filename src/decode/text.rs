//! Generic structured-text grammars for contact-card deployments.
//!
//! Tried in order: JSON object, `key=value` / `key:value` pairs, fixed-position
//! delimited fields. Each one has a structural precondition and fails fast.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::decode::clean::{clean_text, normalize_gender};
use crate::record::{Record, Source};

/// Record attribute a key alias maps to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    Username,
    Dob,
    Age,
    Gender,
    Mobile,
    Email,
    Uid,
    Address,
}

fn alias(key: &str) -> Option<Target> {
    let target = match key {
        "username" | "user" | "name" | "fullname" | "full_name" => Target::Username,
        "dob" | "dateofbirth" | "date_of_birth" | "birth" | "birthdate" => Target::Dob,
        "age" => Target::Age,
        "gender" | "sex" => Target::Gender,
        "mobile" | "phone" | "mobileno" | "mobile_no" | "contact" => Target::Mobile,
        "email" | "mail" => Target::Email,
        "uid" | "aadhaar" => Target::Uid,
        "address" | "addr" => Target::Address,
        _ => return None,
    };
    Some(target)
}

/// Assign an aliased value. Returns false for unknown keys or blank values.
fn assign(record: &mut Record, key: &str, value: &str) -> bool {
    let Some(target) = alias(&key.trim().to_lowercase()) else {
        return false;
    };
    let value = clean_text(value);
    if value.is_empty() {
        return false;
    }
    let slot = match target {
        Target::Username => &mut record.username,
        Target::Dob => &mut record.dob,
        Target::Age => &mut record.age,
        Target::Gender => &mut record.gender,
        Target::Mobile => &mut record.mobile,
        Target::Email => &mut record.email,
        Target::Uid => &mut record.uid,
        Target::Address => &mut record.address,
    };
    *slot = value;
    true
}

fn finish(mut record: Record) -> Record {
    record.gender = normalize_gender(&record.gender);
    record.clean();
    record
}

/// JSON object with aliased keys.
pub(crate) fn parse_json(raw: &str) -> Option<Record> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) else {
        return None;
    };

    let mut record = Record::new(Source::Json);
    let mut recognized = false;
    for (key, value) in &map {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => continue,
        };
        recognized |= assign(&mut record, key, &text);
    }
    recognized.then(|| finish(record))
}

/// `key=value` or `key:value` pairs separated by `;`, newline, `|` or `,`.
pub(crate) fn parse_key_value(raw: &str) -> Option<Record> {
    if !raw.contains('=') && !raw.contains(':') {
        return None;
    }
    static PAIR_SEPARATOR: OnceLock<Regex> = OnceLock::new();
    let separator = PAIR_SEPARATOR.get_or_init(|| Regex::new(r"[;\n|,]").unwrap());

    let mut record = Record::new(Source::KeyValue);
    let mut recognized = false;
    for pair in separator.split(raw) {
        let Some(split_at) = pair.find(['=', ':']) else {
            continue;
        };
        let (key, value) = (&pair[..split_at], &pair[split_at + 1..]);
        recognized |= assign(&mut record, key, value);
    }
    recognized.then(|| finish(record))
}

/// Fixed-position fields: username, dob, age, gender, mobile, email.
///
/// There is no escaping; a field containing the delimiter shifts every field
/// after it.
pub(crate) fn parse_delimited(raw: &str) -> Option<Record> {
    let delimiter = ['|', ',', ';'].into_iter().find(|d| raw.contains(*d))?;
    let parts: Vec<&str> = raw
        .split(delimiter)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    let [username, dob, age, gender, mobile, email, ..] = parts.as_slice() else {
        return None;
    };

    let record = Record {
        username: username.to_string(),
        dob: dob.to_string(),
        age: age.to_string(),
        gender: gender.to_string(),
        mobile: mobile.to_string(),
        email: email.to_string(),
        ..Record::new(Source::Delimited)
    };
    Some(finish(record))
}
