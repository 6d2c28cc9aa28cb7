use delay_engine::{format_amount, Timer};
use delay_types::Amount;

/// `Ns` under a minute, `Mm SSs` otherwise.
pub fn format_countdown(seconds: u64) -> String {
    let minutes = seconds / 60;
    let secs = seconds % 60;
    if minutes == 0 {
        format!("{secs}s")
    } else {
        format!("{minutes}m {secs:02}s")
    }
}

pub fn timer_label(timer: &Timer) -> String {
    match timer {
        Timer::OpensIn(s) => format!("Opens in {}", format_countdown(*s)),
        Timer::ClosesIn(s) => format!("Closes in {}", format_countdown(*s)),
        Timer::DepartsIn(s) => format!("Departs in {}", format_countdown(*s)),
        Timer::Delayed => "Delayed".to_string(),
        Timer::None => "-".to_string(),
    }
}

/// Missing values render as zero; they are never used for decisions here.
pub fn display_amount(value: Option<Amount>, decimals: u8, symbol: &str) -> String {
    format!("{} {symbol}", format_amount(value.unwrap_or(0), decimals, 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_formats() {
        assert_eq!(format_countdown(0), "0s");
        assert_eq!(format_countdown(59), "59s");
        assert_eq!(format_countdown(60), "1m 00s");
        assert_eq!(format_countdown(240), "4m 00s");
        assert_eq!(format_countdown(3_725), "62m 05s");
    }

    #[test]
    fn timer_labels() {
        assert_eq!(timer_label(&Timer::OpensIn(50)), "Opens in 50s");
        assert_eq!(timer_label(&Timer::ClosesIn(240)), "Closes in 4m 00s");
        assert_eq!(timer_label(&Timer::Delayed), "Delayed");
    }
}
