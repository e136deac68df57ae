// Conversões de data e normalização de texto usadas em todo o domínio.

use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Hoje no formato YYYY-MM-DD.
pub fn today_string() -> String {
    today().format("%Y-%m-%d").to_string()
}

/// Aceita YYYY-MM-DD ou DD/MM/YYYY (ano com 2 dígitos vira 20YY).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() == 3 {
        let day: u32 = parts[0].trim().parse().ok()?;
        let month: u32 = parts[1].trim().parse().ok()?;
        let year_str = parts[2].trim();
        let year: i32 = if year_str.len() == 2 {
            2000 + year_str.parse::<i32>().ok()?
        } else {
            year_str.parse().ok()?
        };
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// DD/MM/YYYY. Datas anteriores a 2000 são tratadas como lixo de importação.
pub fn format_date(date: NaiveDate) -> String {
    if date.year() < 2000 {
        return "Data Inválida".to_string();
    }
    date.format("%d/%m/%Y").to_string()
}

pub fn format_date_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%d/%m/%Y %H:%M").to_string()
}

fn strip_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

/// Minúsculas e sem acentos, para comparação e busca.
pub fn normalize_string(s: &str) -> String {
    s.trim().to_lowercase().chars().map(strip_accent).collect()
}

/// "maria DA silva" -> "Maria Da Silva"
pub fn capitalize_words(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.trim().chars() {
        if c.is_alphanumeric() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// Tipo da unidade em maiúsculas, com os apelidos antigos unificados.
pub fn normalize_unit_type(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    match upper.as_str() {
        "" => "OUTROS".to_string(),
        "SEMCAS" => "SEDE".to_string(),
        "ACOLHER E AMAR" => "ABRIGO".to_string(),
        _ => upper,
    }
}

/// Nome de exibição com o tipo na frente ("CRAS Centro"), a menos que o nome já o traga.
pub fn unit_display_name(name: &str, unit_type: &str) -> String {
    const PREFIXED: [&str; 5] = ["CT", "ABRIGO", "SEDE", "CREAS", "CRAS"];
    if PREFIXED.contains(&unit_type) && !name.to_uppercase().starts_with(unit_type) {
        format!("{} {}", unit_type, name)
    } else {
        name.to_string()
    }
}

/// Valor colado de planilha. Só a primeira vírgula vira ponto e vale o maior prefixo
/// numérico, então "1.234,50" vira 1.234. Valor ilegível é zero.
pub fn sanitize_number(raw: &str) -> Decimal {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.').collect();
    let cleaned = cleaned.replacen(',', ".", 1);
    // Vale o maior prefixo numérico válido
    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in cleaned.char_indices() {
        if c == '.' {
            if seen_dot {
                break;
            }
            seen_dot = true;
        }
        end = i + c.len_utf8();
    }
    Decimal::from_str(cleaned[..end].trim_end_matches('.')).unwrap_or(Decimal::ZERO)
}

/// Cabe numa coluna NUMERIC(12, 2) depois de arredondado para centavos.
pub fn fits_money_column(value: &Decimal) -> bool {
    value.round_dp(2).abs() <= Decimal::new(999_999_999_999, 2)
}

pub fn is_valid_quantity(quantity: i64) -> bool {
    quantity > 0
}

pub fn is_valid_string(s: &str) -> bool {
    !s.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_and_brazilian_dates() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(parse_date("2025-03-07"), Some(expected));
        assert_eq!(parse_date("07/03/2025"), Some(expected));
        assert_eq!(parse_date("7/3/25"), Some(expected));
        assert_eq!(parse_date(" 07/03/2025 "), Some(expected));
    }

    #[test]
    fn rejects_garbage_dates() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("31/02/2025"), None);
        assert_eq!(parse_date("ontem"), None);
    }

    #[test]
    fn formats_dates_and_flags_old_years() {
        assert_eq!(format_date(NaiveDate::from_ymd_opt(2024, 12, 1).unwrap()), "01/12/2024");
        assert_eq!(format_date(NaiveDate::from_ymd_opt(1999, 12, 1).unwrap()), "Data Inválida");
    }

    #[test]
    fn normalizes_accents_and_case() {
        assert_eq!(normalize_string("  Conceição AÇAÍ "), "conceicao acai");
    }

    #[test]
    fn capitalizes_each_word() {
        assert_eq!(capitalize_words("maria DA silva"), "Maria Da Silva");
        assert_eq!(capitalize_words("joão-pedro"), "João-Pedro");
    }

    #[test]
    fn unit_types_are_unified() {
        assert_eq!(normalize_unit_type("semcas"), "SEDE");
        assert_eq!(normalize_unit_type("Acolher e Amar"), "ABRIGO");
        assert_eq!(normalize_unit_type("cras"), "CRAS");
        assert_eq!(normalize_unit_type("  "), "OUTROS");
    }

    #[test]
    fn display_name_gets_type_prefix_once() {
        assert_eq!(unit_display_name("Centro", "CRAS"), "CRAS Centro");
        assert_eq!(unit_display_name("CRAS Centro", "CRAS"), "CRAS Centro");
        assert_eq!(unit_display_name("Almoxarifado", "OUTROS"), "Almoxarifado");
    }

    #[test]
    fn sanitizes_spreadsheet_numbers() {
        assert_eq!(sanitize_number("R$ 85,90"), Decimal::from_str("85.90").unwrap());
        assert_eq!(sanitize_number("120.5"), Decimal::from_str("120.5").unwrap());
        assert_eq!(sanitize_number("1.234,50"), Decimal::from_str("1.234").unwrap());
        assert_eq!(sanitize_number("abc"), Decimal::ZERO);
        assert_eq!(sanitize_number(""), Decimal::ZERO);
    }

    #[test]
    fn money_column_bounds() {
        assert!(fits_money_column(&Decimal::from_str("9999999999.99").unwrap()));
        assert!(fits_money_column(&Decimal::ZERO));
        assert!(!fits_money_column(&Decimal::from_str("10000000000").unwrap()));
        // arredonda para 10000000000.00
        assert!(!fits_money_column(&Decimal::from_str("9999999999.999").unwrap()));
    }

    #[test]
    fn quantity_and_string_checks() {
        assert!(is_valid_quantity(1));
        assert!(!is_valid_quantity(0));
        assert!(is_valid_string(" x "));
        assert!(!is_valid_string("   "));
    }
}
