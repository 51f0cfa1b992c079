// Input rules shared by the account, profile and review flows.
// Every failure is a Validation error carrying a user-facing message.

use std::sync::LazyLock;

use regex::Regex;

use cinesorte_common::{contains_profanity, CinesorteError, Result};

pub const IMPROPER_CONTENT: &str = "Conteúdo impróprio.";

pub const MAX_REVIEW_TEXT: usize = 2000;
pub const MAX_COMMENT_TEXT: usize = 1000;
pub const MAX_BIO: usize = 300;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-zÀ-ÖØ-öø-ÿ\s]+$").unwrap());

static HANDLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9_]+$").unwrap());

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

const PASSWORD_SPECIALS: &str = "!@#$&*.,?_~-";

fn invalid(msg: &str) -> CinesorteError {
    CinesorteError::validation(msg)
}

pub fn validate_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    if len < 2 {
        return Err(invalid("Nome muito curto."));
    }
    if len > 50 {
        return Err(invalid("Nome muito longo."));
    }
    if !NAME_RE.is_match(name) {
        return Err(invalid("O nome não pode conter números ou símbolos especiais."));
    }
    Ok(())
}

/// Nicknames at registration and usernames on profile edits share one rule set.
pub fn validate_handle(handle: &str) -> Result<()> {
    let len = handle.chars().count();
    if len < 3 {
        return Err(invalid("Nickname deve ter no mínimo 3 caracteres."));
    }
    if len > 30 {
        return Err(invalid("Nickname muito longo."));
    }
    if !HANDLE_RE.is_match(handle) {
        return Err(invalid(
            "Nickname deve conter apenas letras minúsculas, números e underline.",
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<()> {
    if EMAIL_RE.is_match(email.trim()) {
        Ok(())
    } else {
        Err(invalid("Email inválido."))
    }
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < 6 {
        return Err(invalid("A senha deve ter no mínimo 6 caracteres."));
    }
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_special = password.chars().any(|c| PASSWORD_SPECIALS.contains(c));
    if !has_upper || !has_special {
        return Err(invalid(
            "A senha deve conter pelo menos uma letra maiúscula e um caractere especial (!@#$&*).",
        ));
    }
    Ok(())
}

pub fn validate_rating(rating: f64) -> Result<()> {
    if rating.is_finite() && (0.0..=10.0).contains(&rating) {
        Ok(())
    } else {
        Err(invalid("A nota deve estar entre 0 e 10."))
    }
}

pub fn validate_review_text(text: &str) -> Result<()> {
    if text.chars().count() > MAX_REVIEW_TEXT {
        return Err(invalid("O texto da review é muito longo."));
    }
    reject_profanity(text)
}

pub fn validate_comment_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(invalid("O comentário não pode estar vazio."));
    }
    if text.chars().count() > MAX_COMMENT_TEXT {
        return Err(invalid("O comentário é muito longo."));
    }
    reject_profanity(text)
}

pub fn validate_bio(bio: &str) -> Result<()> {
    if bio.chars().count() > MAX_BIO {
        return Err(invalid("Bio muito longa."));
    }
    reject_profanity(bio)
}

pub fn reject_profanity(text: &str) -> Result<()> {
    if contains_profanity(text) {
        Err(invalid(IMPROPER_CONTENT))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(r: Result<()>) -> String {
        r.unwrap_err().to_string()
    }

    #[test]
    fn names_allow_accents_and_spaces() {
        assert!(validate_name("João da Silva").is_ok());
        assert!(validate_name("Zoë").is_ok());
        assert_eq!(message(validate_name("A")), "Nome muito curto.");
        assert!(validate_name("R2D2").is_err());
    }

    #[test]
    fn handles_are_lowercase_word_chars() {
        assert!(validate_handle("ana_b42").is_ok());
        assert!(validate_handle("Ana").is_err());
        assert!(validate_handle("an").is_err());
        assert!(validate_handle("ana-b").is_err());
        assert!(validate_handle(&"a".repeat(31)).is_err());
    }

    #[test]
    fn password_needs_upper_and_special() {
        assert!(validate_password("Senha!").is_ok());
        assert!(validate_password("Sen!").is_err());
        assert!(validate_password("senha!!").is_err());
        assert!(validate_password("Senhaaa").is_err());
        assert!(validate_password("Abc-def").is_ok());
    }

    #[test]
    fn email_shape() {
        assert!(validate_email("ana@example.com").is_ok());
        assert!(validate_email("ana@example").is_err());
        assert!(validate_email("ana example@x.com").is_err());
    }

    #[test]
    fn rating_bounds_are_inclusive() {
        assert!(validate_rating(0.0).is_ok());
        assert!(validate_rating(10.0).is_ok());
        assert!(validate_rating(10.5).is_err());
        assert!(validate_rating(-0.1).is_err());
        assert!(validate_rating(f64::NAN).is_err());
    }

    #[test]
    fn profane_text_is_rejected_not_sanitized() {
        assert_eq!(message(validate_review_text("que merda de filme")), IMPROPER_CONTENT);
        assert!(validate_review_text("").is_ok());
        assert!(validate_review_text(&"a".repeat(MAX_REVIEW_TEXT + 1)).is_err());
    }

    #[test]
    fn comments_must_have_content() {
        assert_eq!(
            message(validate_comment_text("   ")),
            "O comentário não pode estar vazio."
        );
        assert!(validate_comment_text("Boa!").is_ok());
    }
}
