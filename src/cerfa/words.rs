//! French transcription of amounts, as required by the legal wording of the
//! receipt ("somme en toutes lettres").

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

const UNITS: [&str; 17] = [
    "zéro", "un", "deux", "trois", "quatre", "cinq", "six", "sept", "huit", "neuf", "dix", "onze",
    "douze", "treize", "quatorze", "quinze", "seize",
];

const TENS: [&str; 7] = ["", "dix", "vingt", "trente", "quarante", "cinquante", "soixante"];

/// 0..=99. `final_position` is false when another numeral follows, in which
/// case "quatre-vingts" drops its plural.
fn below_hundred(n: u64, final_position: bool) -> String {
    debug_assert!(n < 100);
    match n {
        0..=16 => UNITS[n as usize].to_string(),
        17..=19 => format!("dix-{}", UNITS[(n - 10) as usize]),
        20..=69 => {
            let (tens, unit) = (n / 10, n % 10);
            match unit {
                0 => TENS[tens as usize].to_string(),
                1 => format!("{} et un", TENS[tens as usize]),
                _ => format!("{}-{}", TENS[tens as usize], UNITS[unit as usize]),
            }
        }
        70..=79 => {
            if n == 71 {
                "soixante et onze".to_string()
            } else {
                format!("soixante-{}", below_hundred(n - 60, true))
            }
        }
        80 => if final_position { "quatre-vingts".to_string() } else { "quatre-vingt".to_string() },
        _ => format!("quatre-vingt-{}", below_hundred(n - 80, true)),
    }
}

/// 0..=999.
fn below_thousand(n: u64, final_position: bool) -> String {
    debug_assert!(n < 1000);
    let (hundreds, rest) = (n / 100, n % 100);
    let head = match hundreds {
        0 => None,
        1 => Some("cent".to_string()),
        h if rest == 0 && final_position => Some(format!("{} cents", UNITS[h as usize])),
        h => Some(format!("{} cent", UNITS[h as usize])),
    };
    match (head, rest) {
        (Some(head), 0) => head,
        (Some(head), rest) => format!("{} {}", head, below_hundred(rest, final_position)),
        (None, rest) => below_hundred(rest, final_position),
    }
}

/// Cardinal number in words, traditional spelling.
pub fn integer_in_words(n: u64) -> String {
    if n == 0 {
        return UNITS[0].to_string();
    }

    const SCALES: [(u64, &str, &str); 3] = [
        (1_000_000_000_000, "billion", "billions"),
        (1_000_000_000, "milliard", "milliards"),
        (1_000_000, "million", "millions"),
    ];

    let mut parts: Vec<String> = Vec::new();
    let mut rest = n;
    for (scale, singular, plural) in SCALES {
        let count = rest / scale;
        rest %= scale;
        if count == 0 {
            continue;
        }
        let noun = if count == 1 { singular } else { plural };
        parts.push(format!("{} {}", integer_in_words(count), noun));
    }

    let thousands = rest / 1000;
    let units = rest % 1000;
    match thousands {
        0 => {}
        1 => parts.push("mille".to_string()),
        t => parts.push(format!("{} mille", below_thousand(t, false))),
    }
    if units > 0 {
        parts.push(below_thousand(units, true));
    }
    parts.join(" ")
}

/// Amount in euros and centimes, e.g. `cent cinquante euros et vingt-cinq centimes`.
pub fn amount_in_words(amount: Decimal) -> String {
    let amount = amount.abs().round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let euros = amount.trunc();
    let centimes = ((amount - euros) * Decimal::ONE_HUNDRED).to_u64().unwrap_or(0);
    let euros = euros.to_u64().unwrap_or(0);

    let mut out = integer_in_words(euros);
    if euros >= 1_000_000 && euros % 1_000_000 == 0 {
        out.push_str(" d'euros");
    } else if euros <= 1 {
        out.push_str(" euro");
    } else {
        out.push_str(" euros");
    }

    if centimes > 0 {
        let unit = if centimes == 1 { "centime" } else { "centimes" };
        out.push_str(&format!(" et {} {}", integer_in_words(centimes), unit));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn words(n: u64) -> String {
        integer_in_words(n)
    }

    #[test]
    fn small_numbers() {
        assert_eq!(words(0), "zéro");
        assert_eq!(words(1), "un");
        assert_eq!(words(16), "seize");
        assert_eq!(words(17), "dix-sept");
        assert_eq!(words(21), "vingt et un");
        assert_eq!(words(22), "vingt-deux");
        assert_eq!(words(70), "soixante-dix");
        assert_eq!(words(71), "soixante et onze");
        assert_eq!(words(77), "soixante-dix-sept");
        assert_eq!(words(80), "quatre-vingts");
        assert_eq!(words(81), "quatre-vingt-un");
        assert_eq!(words(91), "quatre-vingt-onze");
        assert_eq!(words(99), "quatre-vingt-dix-neuf");
    }

    #[test]
    fn hundreds_take_plural_only_at_the_end() {
        assert_eq!(words(100), "cent");
        assert_eq!(words(101), "cent un");
        assert_eq!(words(150), "cent cinquante");
        assert_eq!(words(200), "deux cents");
        assert_eq!(words(280), "deux cent quatre-vingts");
        assert_eq!(words(201), "deux cent un");
    }

    #[test]
    fn thousands_are_invariable() {
        assert_eq!(words(1000), "mille");
        assert_eq!(words(1001), "mille un");
        assert_eq!(words(2000), "deux mille");
        assert_eq!(words(80_000), "quatre-vingt mille");
        assert_eq!(words(200_000), "deux cent mille");
        assert_eq!(words(1990), "mille neuf cent quatre-vingt-dix");
    }

    #[test]
    fn millions_and_milliards_are_nouns() {
        assert_eq!(words(1_000_000), "un million");
        assert_eq!(words(2_000_000), "deux millions");
        assert_eq!(words(200_000_000), "deux cents millions");
        assert_eq!(words(1_500_000_000), "un milliard cinq cents millions");
        assert_eq!(words(3_000_021), "trois millions vingt et un");
    }

    #[test]
    fn amounts_with_currency() {
        let d = |s: &str| Decimal::from_str(s).unwrap();
        assert_eq!(amount_in_words(d("0")), "zéro euro");
        assert_eq!(amount_in_words(d("1.00")), "un euro");
        assert_eq!(amount_in_words(d("150.00")), "cent cinquante euros");
        assert_eq!(amount_in_words(d("150.25")), "cent cinquante euros et vingt-cinq centimes");
        assert_eq!(amount_in_words(d("0.01")), "zéro euro et un centime");
        assert_eq!(amount_in_words(d("2000000")), "deux millions d'euros");
        assert_eq!(amount_in_words(d("2000001")), "deux millions un euros");
    }
}
