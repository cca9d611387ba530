use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

const COMMON_PASSWORDS: &str = include_str!("common_passwords.txt");

/// Account attributes a new password must not resemble.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserAttributes<'a> {
    pub username: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
}

impl<'a> UserAttributes<'a> {
    fn labelled(&self) -> [(&'static str, &'a str); 4] {
        [
            ("nome de usuário", self.username),
            ("primeiro nome", self.first_name),
            ("sobrenome", self.last_name),
            ("endereço de email", self.email),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_similarity: f64,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_similarity: 0.7,
        }
    }
}

impl PasswordPolicy {
    /// Every rule the password breaks, in a stable order. Empty means valid.
    pub fn validate(&self, password: &str, user: &UserAttributes<'_>) -> Vec<String> {
        let mut errors = Vec::new();

        if let Some(label) = self.similar_attribute(password, user) {
            errors.push(format!("A senha é muito parecida com o campo {}.", label));
        }
        if password.chars().count() < self.min_length {
            errors.push(format!(
                "Esta senha é muito curta. Ela precisa conter pelo menos {} caracteres.",
                self.min_length
            ));
        }
        if is_common(password) {
            errors.push("Esta senha é muito comum.".to_string());
        }
        if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
            errors.push("Esta senha é inteiramente numérica.".to_string());
        }

        errors
    }

    fn similar_attribute(&self, password: &str, user: &UserAttributes<'_>) -> Option<&'static str> {
        let password = password.to_lowercase();
        let password_len = password.chars().count();

        for (label, value) in user.labelled() {
            if value.trim().is_empty() {
                continue;
            }
            let value = value.to_lowercase();
            let parts = word_separator()
                .split(&value)
                .map(str::to_string)
                .chain(std::iter::once(value.clone()));

            for part in parts {
                if self.exceeds_length_ratio(password_len, part.chars().count()) {
                    continue;
                }
                if quick_ratio(&password, &part) >= self.max_similarity {
                    return Some(label);
                }
            }
        }

        None
    }

    // Short attribute parts cannot meaningfully resemble a much longer password.
    fn exceeds_length_ratio(&self, password_len: usize, value_len: usize) -> bool {
        let bound = self.max_similarity / 2.0 * password_len as f64;
        password_len >= 10 * value_len && (value_len as f64) < bound
    }
}

fn word_separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\W+").expect("word separator pattern is valid"))
}

fn common_passwords() -> &'static HashSet<String> {
    static SET: OnceLock<HashSet<String>> = OnceLock::new();
    SET.get_or_init(|| {
        COMMON_PASSWORDS
            .lines()
            .map(|line| line.trim().to_lowercase())
            .filter(|line| !line.is_empty())
            .collect()
    })
}

pub fn is_common(password: &str) -> bool {
    common_passwords().contains(&password.trim().to_lowercase())
}

/// Upper bound on the similarity of two strings from their shared
/// characters, ignoring order.
pub fn quick_ratio(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 1.0;
    }

    let mut available: HashMap<char, usize> = HashMap::new();
    for c in b.chars() {
        *available.entry(c).or_default() += 1;
    }

    let mut matches = 0;
    for c in a.chars() {
        if let Some(count) = available.get_mut(&c) {
            if *count > 0 {
                *count -= 1;
                matches += 1;
            }
        }
    }

    2.0 * matches as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ana() -> UserAttributes<'static> {
        UserAttributes {
            username: "ana",
            first_name: "Ana",
            last_name: "Souza",
            email: "ana.souza@example.com",
        }
    }

    #[test]
    fn test_strong_password_passes() {
        let policy = PasswordPolicy::default();
        assert!(policy.validate("Tr0ca-de-Cartas!", &ana()).is_empty());
    }

    #[test]
    fn test_short_password() {
        let errors = PasswordPolicy::default().validate("x7#kq", &ana());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("muito curta"));
    }

    #[test]
    fn test_numeric_password_reports_every_violation() {
        let errors = PasswordPolicy::default().validate("123456", &ana());
        assert!(errors.iter().any(|e| e.contains("muito curta")));
        assert!(errors.iter().any(|e| e.contains("muito comum")));
        assert!(errors.iter().any(|e| e.contains("inteiramente numérica")));
    }

    #[test]
    fn test_common_password_is_case_insensitive() {
        assert!(is_common("PASSWORD"));
        assert!(is_common("senha123"));
        assert!(!is_common("Tr0ca-de-Cartas!"));
    }

    #[test]
    fn test_similar_to_username() {
        let user = UserAttributes { username: "joaosilva", ..Default::default() };
        let errors = PasswordPolicy::default().validate("joaosilva1", &user);
        assert!(errors.iter().any(|e| e.contains("nome de usuário")));
    }

    #[test]
    fn test_similar_to_email_word_part() {
        let errors = PasswordPolicy::default().validate("souza2024", &ana());
        assert!(errors.iter().any(|e| e.contains("parecida")));
    }

    #[test]
    fn test_short_attribute_is_ignored_for_long_password() {
        let user = UserAttributes { username: "ab", ..Default::default() };
        assert!(PasswordPolicy::default().similar_attribute("abqwzxmnvbpl-9182736", &user).is_none());
    }

    #[test]
    fn test_quick_ratio() {
        assert_eq!(quick_ratio("abc", "abc"), 1.0);
        assert_eq!(quick_ratio("abc", "xyz"), 0.0);
        assert!((quick_ratio("abcd", "ab") - 2.0 * 2.0 / 6.0).abs() < f64::EPSILON);
    }
}
