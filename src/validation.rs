//! Client-side field validation and input masks for the application forms.
//!
//! Rules are chosen by field name, the same way the site's form markup does:
//! a field called `email` is checked as an e-mail address, `cpf` gets the
//! checksum test, and so on. Format rules only run on non-blank values; blank
//! values fail only when the field is required.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(\d{2}\)\s\d{4,5}-\d{4}$").expect("valid phone pattern"));
static ZIPCODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}-\d{3}$").expect("valid zipcode pattern"));
static PERSON_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-ZÀ-ÿ\s]+$").expect("valid name pattern"));
static NOT_NAME_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-ZÀ-ÿ\s]").expect("valid name mask"));

static PHONE_MASK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{2})(\d{4,5})(\d{4})").expect("valid phone mask"));
static CPF_MASK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{3})(\d{3})(\d{3})(\d{2})").expect("valid cpf mask"));
static RG_MASK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{2})(\d{3})(\d{3})(\d{1})").expect("valid rg mask"));
static ZIPCODE_MASK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{5})(\d{3})").expect("valid zipcode mask"));

/// How a field's value is checked and formatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Email,
    /// Brazilian phone number, `(11) 99999-9999`
    Phone,
    /// Brazilian taxpayer number
    Cpf,
    /// Brazilian identity card number (masked, not validated)
    Rg,
    /// Brazilian postal code (CEP), `00000-000`
    Zipcode,
    /// Person's name: letters (accented included) and spaces
    Name,
    /// Web address, scheme optional
    Url,
}

impl FieldKind {
    /// Pick the rule for a field from its name.
    pub fn infer(name: &str) -> Self {
        match name {
            "email" => FieldKind::Email,
            "phone" => FieldKind::Phone,
            "cpf" => FieldKind::Cpf,
            "rg" => FieldKind::Rg,
            "zipcode" => FieldKind::Zipcode,
            "name" => FieldKind::Name,
            "website" => FieldKind::Url,
            _ => FieldKind::Text,
        }
    }

    /// Apply this kind's input mask to a freshly typed value.
    ///
    /// The mask is applied to the digits of `value` only while their count fits
    /// the mask; longer input is returned as typed.
    pub fn mask(&self, value: &str) -> String {
        let (pattern, max_digits, replacement): (&Regex, usize, &str) = match self {
            FieldKind::Phone => (&*PHONE_MASK, 11, "($1) $2-$3"),
            FieldKind::Cpf => (&*CPF_MASK, 11, "$1.$2.$3-$4"),
            FieldKind::Rg => (&*RG_MASK, 9, "$1.$2.$3-$4"),
            FieldKind::Zipcode => (&*ZIPCODE_MASK, 8, "$1-$2"),
            FieldKind::Name => return NOT_NAME_CHAR.replace_all(value, "").into_owned(),
            FieldKind::Text | FieldKind::Email | FieldKind::Url => return value.to_string(),
        };

        let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() > max_digits {
            return value.to_string();
        }
        pattern.replace(&digits, replacement).into_owned()
    }
}

/// Declaration of one form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: String,
    pub required: bool,
    pub kind: FieldKind,
    /// Minimum length in characters of a non-blank value
    pub min_len: Option<usize>,
}

impl FieldSpec {
    pub fn required(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required: true,
            kind: FieldKind::infer(name),
            min_len: None,
        }
    }

    pub fn optional(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required: false,
            kind: FieldKind::infer(name),
            min_len: None,
        }
    }

    pub fn with_min_len(mut self, min_len: usize) -> Self {
        self.min_len = Some(min_len);
        self
    }

    /// Check `value` against this field's rules.
    pub fn validate(&self, value: &str) -> Result<(), ValidationMessage> {
        let value = value.trim();
        if value.is_empty() {
            return if self.required {
                Err(ValidationMessage::Required)
            } else {
                Ok(())
            };
        }

        if let Some(min) = self.min_len.filter(|min| value.chars().count() < *min) {
            return Err(ValidationMessage::TooShort { min });
        }

        match self.kind {
            FieldKind::Email if !EMAIL.is_match(value) => Err(ValidationMessage::InvalidEmail),
            FieldKind::Phone if !PHONE.is_match(value) => Err(ValidationMessage::InvalidPhone),
            FieldKind::Cpf if !is_valid_cpf(value) => Err(ValidationMessage::InvalidCpf),
            FieldKind::Zipcode if !ZIPCODE.is_match(value) => {
                Err(ValidationMessage::InvalidZipcode)
            }
            FieldKind::Name if !PERSON_NAME.is_match(value) => Err(ValidationMessage::LettersOnly),
            FieldKind::Url if parse_url(value).is_none() => Err(ValidationMessage::InvalidUrl),
            _ => Ok(()),
        }
    }
}

/// Why a field failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMessage {
    Required,
    InvalidEmail,
    InvalidPhone,
    InvalidCpf,
    InvalidZipcode,
    TooShort { min: usize },
    LettersOnly,
    InvalidUrl,
}

impl ValidationMessage {
    /// Catalog key for the localized message.
    pub fn i18n_key(&self) -> &'static str {
        match self {
            ValidationMessage::Required => "i18n.validation.required",
            ValidationMessage::InvalidEmail => "i18n.validation.email",
            ValidationMessage::InvalidPhone => "i18n.validation.phone",
            ValidationMessage::InvalidCpf => "i18n.validation.cpf",
            ValidationMessage::InvalidZipcode => "i18n.validation.cep",
            ValidationMessage::TooShort { .. } => "i18n.validation.min_length",
            ValidationMessage::LettersOnly => "i18n.validation.letters",
            ValidationMessage::InvalidUrl => "i18n.validation.url",
        }
    }
}

impl fmt::Display for ValidationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ValidationMessage::TooShort { min } => {
                return write!(f, "must be at least {min} characters");
            }
            ValidationMessage::LettersOnly => "only letters are allowed",
            ValidationMessage::InvalidUrl => "invalid URL",
            ValidationMessage::Required => "this field is required",
            ValidationMessage::InvalidEmail => "invalid email",
            ValidationMessage::InvalidPhone => "invalid phone, use the format (11) 99999-9999",
            ValidationMessage::InvalidCpf => "invalid CPF",
            ValidationMessage::InvalidZipcode => "invalid zipcode, use the format 00000-000",
        };
        f.write_str(text)
    }
}

/// Field-scoped validation failures, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, ValidationMessage>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, message: ValidationMessage) {
        self.0.insert(field.into(), message);
    }

    pub fn remove(&mut self, field: &str) -> Option<ValidationMessage> {
        self.0.remove(field)
    }

    pub fn get(&self, field: &str) -> Option<ValidationMessage> {
        self.0.get(field).copied()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ValidationMessage)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Merge `other` into `self`, replacing messages for the same field.
    pub fn extend(&mut self, other: FieldErrors) {
        self.0.extend(other.0);
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

/// Validate every field in `fields` against `values`. Missing values count as blank.
pub fn validate_fields(
    fields: &[FieldSpec],
    values: &BTreeMap<String, String>,
) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    for field in fields {
        let value = values.get(&field.name).map(String::as_str).unwrap_or("");
        if let Err(message) = field.validate(value) {
            errors.insert(field.name.clone(), message);
        }
    }
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Parse a web address, assuming `http://` when no scheme is given.
/// Returns None unless the result has a host.
pub fn parse_url(value: &str) -> Option<reqwest::Url> {
    let value = value.trim();
    let url = if value.starts_with("http://") || value.starts_with("https://") {
        reqwest::Url::parse(value)
    } else {
        reqwest::Url::parse(&format!("http://{value}"))
    }
    .ok()?;
    url.host_str().is_some_and(|h| !h.is_empty()).then_some(url)
}

/// CPF check: 11 digits, not all the same, and both mod-11 check digits match.
pub fn is_valid_cpf(cpf: &str) -> bool {
    let digits: Vec<u32> = cpf.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 11 || digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    let check_digit = |len: usize| {
        let sum: u32 = digits[..len]
            .iter()
            .enumerate()
            .map(|(i, d)| d * (len as u32 + 1 - i as u32))
            .sum();
        let digit = 11 - (sum % 11);
        if digit >= 10 { 0 } else { digit }
    };

    check_digit(9) == digits[9] && check_digit(10) == digits[10]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpf_checksum() {
        assert!(is_valid_cpf("529.982.247-25"));
        assert!(is_valid_cpf("52998224725"));
        assert!(!is_valid_cpf("529.982.247-26"));
        assert!(!is_valid_cpf("111.111.111-11"));
        assert!(!is_valid_cpf("1234"));
    }

    #[test]
    fn test_required_blank() {
        let field = FieldSpec::required("full_name");
        assert_eq!(field.validate("   "), Err(ValidationMessage::Required));
        assert_eq!(field.validate("Maria"), Ok(()));
        assert_eq!(FieldSpec::optional("address").validate(""), Ok(()));
    }

    #[test]
    fn test_required_email_blank_is_required_error() {
        let field = FieldSpec::required("email");
        assert_eq!(field.validate(""), Err(ValidationMessage::Required));
    }

    #[test]
    fn test_format_rules() {
        let email = FieldSpec::required("email");
        assert_eq!(email.validate("maria@"), Err(ValidationMessage::InvalidEmail));
        assert_eq!(email.validate("maria@kaizen.com.br"), Ok(()));

        let phone = FieldSpec::required("phone");
        assert_eq!(phone.validate("11999999999"), Err(ValidationMessage::InvalidPhone));
        assert_eq!(phone.validate("(11) 99999-9999"), Ok(()));
        assert_eq!(phone.validate("(11) 3333-4444"), Ok(()));

        let zipcode = FieldSpec::optional("zipcode");
        assert_eq!(zipcode.validate("01310100"), Err(ValidationMessage::InvalidZipcode));
        assert_eq!(zipcode.validate("01310-100"), Ok(()));
    }

    #[test]
    fn test_masks() {
        assert_eq!(FieldKind::Phone.mask("11999998888"), "(11) 99999-8888");
        assert_eq!(FieldKind::Phone.mask("1133334444"), "(11) 3333-4444");
        assert_eq!(FieldKind::Cpf.mask("52998224725"), "529.982.247-25");
        assert_eq!(FieldKind::Rg.mask("123456789"), "12.345.678-9");
        assert_eq!(FieldKind::Zipcode.mask("01310100"), "01310-100");
        // Partial input stays as digits until the mask matches
        assert_eq!(FieldKind::Cpf.mask("529.98"), "52998");
        // Too many digits: left as typed
        assert_eq!(FieldKind::Zipcode.mask("013101000"), "013101000");
        assert_eq!(FieldKind::Text.mask("São Paulo"), "São Paulo");
    }

    #[test]
    fn test_person_name_rules() {
        let name = FieldSpec::required("name").with_min_len(2);
        assert_eq!(name.kind, FieldKind::Name);
        assert_eq!(name.validate("J"), Err(ValidationMessage::TooShort { min: 2 }));
        assert_eq!(name.validate("João da Silva"), Ok(()));
        assert_eq!(name.validate("R2D2"), Err(ValidationMessage::LettersOnly));
        assert_eq!(FieldKind::Name.mask("Jo4ão_ Silva!"), "João Silva");
    }

    #[test]
    fn test_min_len_counts_characters() {
        let message = FieldSpec::required("message").with_min_len(10);
        assert_eq!(
            message.validate("  curto  "),
            Err(ValidationMessage::TooShort { min: 10 })
        );
        assert_eq!(message.validate("ação ação!"), Ok(()));
        assert_eq!(
            ValidationMessage::TooShort { min: 10 }.to_string(),
            "must be at least 10 characters"
        );
    }

    #[test]
    fn test_website_rules() {
        let website = FieldSpec::optional("website");
        assert_eq!(website.kind, FieldKind::Url);
        assert_eq!(website.validate(""), Ok(()));
        assert_eq!(website.validate("agenciakaizen.com.br"), Ok(()));
        assert_eq!(website.validate("https://agenciakaizen.com.br/blog"), Ok(()));
        assert_eq!(website.validate("http://"), Err(ValidationMessage::InvalidUrl));
        assert_eq!(
            parse_url("agenciakaizen.com.br").unwrap().as_str(),
            "http://agenciakaizen.com.br/"
        );
    }

    #[test]
    fn test_validate_fields_collects_all() {
        let fields = vec![
            FieldSpec::required("full_name"),
            FieldSpec::required("email"),
            FieldSpec::optional("zipcode"),
        ];
        let mut values = BTreeMap::new();
        values.insert("email".to_string(), "not-an-email".to_string());

        let errors = validate_fields(&fields, &values).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("full_name"), Some(ValidationMessage::Required));
        assert_eq!(errors.get("email"), Some(ValidationMessage::InvalidEmail));
        assert_eq!(
            errors.to_string(),
            "email: invalid email; full_name: this field is required"
        );
    }
}
