use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
    PrimitiveDateTime,
};

use super::dto::{UploadedFile, UserForm};
use super::repo_types::{Gender, Role};
use crate::error::FieldViolation;

pub struct FileRules {
    pub extnames: &'static [&'static str],
    pub max_size: u64,
}

pub const AVATAR_RULES: FileRules = FileRules {
    extnames: &["jpg", "jpeg", "png"],
    max_size: 2 * 1024 * 1024,
};

/// Avatar that passed [`AVATAR_RULES`].
#[derive(Debug, Clone)]
pub struct ValidatedFile {
    pub original_name: String,
    pub extname: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct ValidatedUser {
    pub email: String,
    pub password: Option<String>,
    pub fullname: String,
    pub gender: Gender,
    pub role: Role,
    pub birthday: Date,
    pub avatar: Option<ValidatedFile>,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn parse_date(s: &str) -> Option<Date> {
    Date::parse(s, format_description!("[year]-[month]-[day]"))
        .ok()
        .or_else(|| OffsetDateTime::parse(s, &Rfc3339).ok().map(|dt| dt.date()))
        .or_else(|| {
            PrimitiveDateTime::parse(
                s,
                format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
            )
            .ok()
            .map(|dt| dt.date())
        })
}

fn extname(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then(|| ext.to_ascii_lowercase())
}

/// Trimmed value, with blank strings treated as absent.
fn present(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn required(
    field: &'static str,
    v: Option<String>,
    errors: &mut Vec<FieldViolation>,
) -> Option<String> {
    let v = present(v);
    if v.is_none() {
        errors.push(FieldViolation::new(field, "required", format!("{field} is required")));
    }
    v
}

fn check_file(
    field: &'static str,
    file: UploadedFile,
    rules: &FileRules,
    errors: &mut Vec<FieldViolation>,
) -> Option<ValidatedFile> {
    let ext = extname(&file.file_name);
    let allowed = ext
        .as_deref()
        .is_some_and(|e| rules.extnames.contains(&e));
    if !allowed {
        errors.push(FieldViolation::new(
            field,
            "file.extname",
            format!("{field} must be one of: {}", rules.extnames.join(", ")),
        ));
    }
    if file.body.len() as u64 > rules.max_size {
        errors.push(FieldViolation::new(
            field,
            "file.size",
            format!("{field} must be at most {} bytes", rules.max_size),
        ));
    }
    match ext {
        Some(extname) if allowed && file.body.len() as u64 <= rules.max_size => Some(ValidatedFile {
            original_name: file.file_name,
            extname,
            content_type: file.content_type,
            body: file.body,
        }),
        _ => None,
    }
}

/// Applies the create/update schema. Every failing field is reported.
pub fn validate_user(form: UserForm) -> Result<ValidatedUser, Vec<FieldViolation>> {
    let mut errors = Vec::new();

    let email = required("email", form.email, &mut errors);
    if let Some(e) = email.as_deref() {
        if !is_valid_email(e) {
            errors.push(FieldViolation::new("email", "email", "email must be a valid email address"));
        }
    }

    // The credential is kept byte for byte; only an empty string means absent.
    let password = form.password.filter(|p| !p.is_empty());
    let fullname = required("fullname", form.fullname, &mut errors);

    let gender = required("gender", form.gender, &mut errors).and_then(|g| {
        let parsed = Gender::parse(&g);
        if parsed.is_none() {
            errors.push(FieldViolation::new(
                "gender",
                "enum",
                format!("gender must be one of: {}", Gender::ALL.join(", ")),
            ));
        }
        parsed
    });

    let role = required("role", form.role, &mut errors).and_then(|r| {
        let parsed = Role::parse(&r);
        if parsed.is_none() {
            errors.push(FieldViolation::new(
                "role",
                "enum",
                format!("role must be one of: {}", Role::ALL.join(", ")),
            ));
        }
        parsed
    });

    let birthday = required("birthday", form.birthday, &mut errors).and_then(|b| {
        let parsed = parse_date(&b);
        if parsed.is_none() {
            errors.push(FieldViolation::new(
                "birthday",
                "date.format",
                "birthday must be a date formatted as YYYY-MM-DD",
            ));
        }
        parsed
    });

    let avatar = form
        .avatar
        .filter(|f| !(f.file_name.is_empty() && f.body.is_empty()))
        .and_then(|f| check_file("avatar", f, &AVATAR_RULES, &mut errors));

    if !errors.is_empty() {
        return Err(errors);
    }

    match (email, fullname, gender, role, birthday) {
        (Some(email), Some(fullname), Some(gender), Some(role), Some(birthday)) => Ok(ValidatedUser {
            email,
            password,
            fullname,
            gender,
            role,
            birthday,
            avatar,
        }),
        _ => Err(errors),
    }
}
