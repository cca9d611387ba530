//! Brazilian identity and address value types: CPF, CEP and the 27
//! federative units.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Returns true when `input` is a CPF with valid check digits.
///
/// Accepts bare digits or the usual `NNN.NNN.NNN-NN` punctuation.
pub fn validate_cpf(input: &str) -> bool {
    Cpf::parse(input).is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpfError {
    InvalidCharacters,
    InvalidLength,
    RepeatedDigits,
    InvalidChecksum,
}

impl fmt::Display for CpfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            CpfError::InvalidCharacters => "CPF deve conter apenas números, pontos e hífen.",
            CpfError::InvalidLength => "CPF deve conter exatamente 11 dígitos.",
            CpfError::RepeatedDigits | CpfError::InvalidChecksum => "Número de CPF inválido.",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for CpfError {}

/// Individual taxpayer number, kept as its 11 digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cpf(String);

impl Cpf {
    pub fn parse(input: &str) -> Result<Self, CpfError> {
        let mut digits = Vec::with_capacity(11);
        for c in input.trim().chars() {
            match c {
                '0'..='9' => digits.push(c as u8 - b'0'),
                '.' | '-' | ' ' => {}
                _ => return Err(CpfError::InvalidCharacters),
            }
        }

        if digits.len() != 11 {
            return Err(CpfError::InvalidLength);
        }
        if digits.iter().all(|d| *d == digits[0]) {
            return Err(CpfError::RepeatedDigits);
        }
        if check_digit(&digits[..9]) != digits[9] || check_digit(&digits[..10]) != digits[10] {
            return Err(CpfError::InvalidChecksum);
        }

        Ok(Cpf(digits.iter().map(|d| char::from(b'0' + d)).collect()))
    }

    /// Builds a valid CPF from a 9-digit base by appending both check digits.
    pub fn from_base(base: [u8; 9]) -> Result<Self, CpfError> {
        if base.iter().any(|d| *d > 9) {
            return Err(CpfError::InvalidCharacters);
        }
        let mut digits = base.to_vec();
        digits.push(check_digit(&digits));
        digits.push(check_digit(&digits));
        let text: String = digits.iter().map(|d| char::from(b'0' + d)).collect();
        Cpf::parse(&text)
    }

    pub fn digits(&self) -> &str {
        &self.0
    }

    /// `NNN.NNN.NNN-NN`
    pub fn formatted(&self) -> String {
        let d = &self.0;
        format!("{}.{}.{}-{}", &d[0..3], &d[3..6], &d[6..9], &d[9..11])
    }
}

/// Weighted mod-11 check digit over `digits` (9 or 10 of them); weights
/// run from `len + 1` down to 2.
fn check_digit(digits: &[u8]) -> u8 {
    let weight_start = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| *d as u32 * (weight_start - i as u32))
        .sum();
    let remainder = sum % 11;
    if remainder < 2 { 0 } else { (11 - remainder) as u8 }
}

impl fmt::Display for Cpf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

impl FromStr for Cpf {
    type Err = CpfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cpf::parse(s)
    }
}

impl TryFrom<String> for Cpf {
    type Error = CpfError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Cpf::parse(&value)
    }
}

impl From<Cpf> for String {
    fn from(cpf: Cpf) -> Self {
        cpf.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CepError;

impl fmt::Display for CepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Informe um CEP no formato XXXXX-XXX.")
    }
}

impl std::error::Error for CepError {}

/// Postal code, canonical form `NNNNN-NNN`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cep(String);

impl Cep {
    pub fn parse(input: &str) -> Result<Self, CepError> {
        let input = input.trim();
        let digits: String = match input.len() {
            8 => input.to_string(),
            9 if input.as_bytes()[5] == b'-' => format!("{}{}", &input[..5], &input[6..]),
            _ => return Err(CepError),
        };
        if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CepError);
        }
        Ok(Cep(format!("{}-{}", &digits[..5], &digits[5..])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Cep {
    type Error = CepError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Cep::parse(&value)
    }
}

impl From<Cep> for String {
    fn from(cep: Cep) -> Self {
        cep.0
    }
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\+?\d{9,15}$").expect("phone pattern is valid"))
}

/// Loose international phone check. Spaces, parentheses, dots and dashes
/// are ignored so `(21) 99999-9999` passes.
pub fn is_valid_phone(input: &str) -> bool {
    let compact: String = input
        .chars()
        .filter(|c| !matches!(c, ' ' | '(' | ')' | '-' | '.'))
        .collect();
    phone_pattern().is_match(&compact)
}

macro_rules! federative_units {
    ($($variant:ident => $code:literal, $name:literal;)+) => {
        /// One of the 27 Brazilian federative units (26 states plus DF).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum FederativeUnit {
            $($variant,)+
        }

        impl FederativeUnit {
            pub const ALL: [FederativeUnit; 27] = [$(FederativeUnit::$variant,)+];

            pub fn code(&self) -> &'static str {
                match self {
                    $(FederativeUnit::$variant => $code,)+
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $(FederativeUnit::$variant => $name,)+
                }
            }
        }

        impl FromStr for FederativeUnit {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($code => Ok(FederativeUnit::$variant),)+
                    other => Err(format!("Unidade federativa inválida: {}", other)),
                }
            }
        }
    };
}

federative_units! {
    Ac => "AC", "Acre";
    Al => "AL", "Alagoas";
    Ap => "AP", "Amapá";
    Am => "AM", "Amazonas";
    Ba => "BA", "Bahia";
    Ce => "CE", "Ceará";
    Df => "DF", "Distrito Federal";
    Es => "ES", "Espírito Santo";
    Go => "GO", "Goiás";
    Ma => "MA", "Maranhão";
    Mt => "MT", "Mato Grosso";
    Ms => "MS", "Mato Grosso do Sul";
    Mg => "MG", "Minas Gerais";
    Pa => "PA", "Pará";
    Pb => "PB", "Paraíba";
    Pr => "PR", "Paraná";
    Pe => "PE", "Pernambuco";
    Pi => "PI", "Piauí";
    Rj => "RJ", "Rio de Janeiro";
    Rn => "RN", "Rio Grande do Norte";
    Rs => "RS", "Rio Grande do Sul";
    Ro => "RO", "Rondônia";
    Rr => "RR", "Roraima";
    Sc => "SC", "Santa Catarina";
    Sp => "SP", "São Paulo";
    Se => "SE", "Sergipe";
    To => "TO", "Tocantins";
}

impl Default for FederativeUnit {
    fn default() -> Self {
        FederativeUnit::Rj
    }
}

impl fmt::Display for FederativeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_valid_cpfs() {
        for cpf in ["529.982.247-25", "52998224725", "111.444.777-35", "390.533.447-05"] {
            assert!(validate_cpf(cpf), "{} should be valid", cpf);
        }
    }

    #[test]
    fn test_altering_either_check_digit_invalidates() {
        let base = "529982247";
        for wrong in 0..10u8 {
            if wrong != 2 {
                assert!(!validate_cpf(&format!("{}{}5", base, wrong)));
            }
            if wrong != 5 {
                assert!(!validate_cpf(&format!("{}2{}", base, wrong)));
            }
        }
    }

    #[test]
    fn test_generated_cpfs_validate_and_break_when_altered() {
        let bases: [[u8; 9]; 4] = [
            [1, 2, 3, 4, 5, 6, 7, 8, 9],
            [9, 8, 7, 6, 5, 4, 3, 2, 1],
            [0, 0, 0, 0, 0, 0, 0, 1, 9],
            [4, 4, 4, 5, 5, 5, 6, 6, 6],
        ];
        for base in bases {
            let cpf = Cpf::from_base(base).unwrap();
            assert!(validate_cpf(cpf.digits()));

            let digits: Vec<char> = cpf.digits().chars().collect();
            for pos in [9usize, 10] {
                let original = digits[pos].to_digit(10).unwrap();
                let mut altered = digits.clone();
                altered[pos] = char::from_digit((original + 1) % 10, 10).unwrap();
                let altered: String = altered.into_iter().collect();
                assert!(!validate_cpf(&altered), "{} should be rejected", altered);
            }
        }
    }

    #[test]
    fn test_cpf_rejects_malformed_input() {
        assert_eq!(Cpf::parse("529.982.247-2"), Err(CpfError::InvalidLength));
        assert_eq!(Cpf::parse("529.982.247-255"), Err(CpfError::InvalidLength));
        assert_eq!(Cpf::parse("52a.982.247-25"), Err(CpfError::InvalidCharacters));
        assert_eq!(Cpf::parse("111.111.111-11"), Err(CpfError::RepeatedDigits));
        assert_eq!(Cpf::parse("000.000.000-00"), Err(CpfError::RepeatedDigits));
        assert_eq!(Cpf::parse(""), Err(CpfError::InvalidLength));
    }

    #[test]
    fn test_cpf_normalizes_and_formats() {
        let cpf = Cpf::parse(" 529.982.247-25 ").unwrap();
        assert_eq!(cpf.digits(), "52998224725");
        assert_eq!(cpf.to_string(), "529.982.247-25");
        assert_eq!(Cpf::parse("52998224725").unwrap(), cpf);
    }

    #[test]
    fn test_cep_accepts_both_forms() {
        assert_eq!(Cep::parse("20040-020").unwrap().as_str(), "20040-020");
        assert_eq!(Cep::parse("20040020").unwrap().as_str(), "20040-020");
    }

    #[test]
    fn test_cep_rejects_malformed() {
        for bad in ["2004-0020", "20040-02", "2004002", "20040_020", "abcde-fgh", "200400200", ""] {
            assert!(Cep::parse(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_phone_pattern() {
        assert!(is_valid_phone("(21) 99999-9999"));
        assert!(is_valid_phone("+5521999999999"));
        assert!(is_valid_phone("999999999"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("+55 21 abc"));
        assert!(!is_valid_phone("1234567890123456"));
    }

    #[test]
    fn test_federative_units() {
        assert_eq!(FederativeUnit::ALL.len(), 27);
        assert_eq!(FederativeUnit::default(), FederativeUnit::Rj);
        assert_eq!("sp".parse::<FederativeUnit>(), Ok(FederativeUnit::Sp));
        assert_eq!(FederativeUnit::Df.name(), "Distrito Federal");
        assert!("XX".parse::<FederativeUnit>().is_err());
    }
}
