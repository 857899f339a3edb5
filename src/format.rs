//! Text formatting for amounts and dates shown to the user.

use std::sync::OnceLock;

use numfmt::{Formatter, Precision};
use time::{Date, macros::format_description};

/// Format `number` as dollars with two decimal places, e.g. "-$42.50".
pub fn currency(number: f64) -> String {
    static POSITIVE_FMT: OnceLock<Option<Formatter>> = OnceLock::new();
    static NEGATIVE_FMT: OnceLock<Option<Formatter>> = OnceLock::new();

    let positive_fmt = POSITIVE_FMT.get_or_init(|| currency_formatter("$"));
    let negative_fmt = NEGATIVE_FMT.get_or_init(|| currency_formatter("-$"));

    let formatted_string = if number < 0.0 {
        match negative_fmt {
            Some(formatter) => formatter.fmt_string(number.abs()),
            None => format!("-${:.2}", number.abs()),
        }
    } else if number > 0.0 {
        match positive_fmt {
            Some(formatter) => formatter.fmt_string(number),
            None => format!("${number:.2}"),
        }
    } else {
        // numfmt renders zero as "0"
        return "$0.00".to_owned();
    };

    pad_cents(formatted_string)
}

fn currency_formatter(prefix: &str) -> Option<Formatter> {
    Formatter::currency(prefix)
        .inspect_err(|error| tracing::error!("could not create currency formatter: {error:?}"))
        .ok()
        .map(|formatter| formatter.precision(Precision::Decimals(2)))
}

/// numfmt drops trailing zeros, "12.30" comes out as "12.3".
fn pad_cents(mut text: String) -> String {
    match text.rfind('.') {
        Some(dot) => {
            let decimals = text.len() - dot - 1;
            for _ in decimals..2 {
                text.push('0');
            }
        }
        None => text.push_str(".00"),
    }

    text
}

/// Format a transaction date as `YYYY-MM-DD`.
pub fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}
