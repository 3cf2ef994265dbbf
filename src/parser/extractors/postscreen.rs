use crate::metrics::Metric;
use crate::parser::extractors::{reject_code, Extractor};
use crate::parser::Extraction;
use once_cell::sync::Lazy;
use regex::Regex;

pub const EXTRACTORS: &[Extractor] = &[Extractor::new("reject", reject)];

static REJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^NOQUEUE: reject: RCPT from \S+: (?P<code>\d+) ")
        .expect("postscreen reject pattern is valid")
});

/// `NOQUEUE: reject: RCPT from [192.0.2.10]:12345: 550 5.7.1 Service unavailable; ...`
fn reject(message: &str) -> Extraction {
    reject_code(&REJECT, message, Metric::PostscreenRejects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MetricEffect;

    #[test]
    fn reject_codes_become_labels() {
        assert_eq!(
            reject("NOQUEUE: reject: RCPT from [1.2.3.4]:12345: 550 5.7.1 Service unavailable; client [1.2.3.4] blocked using DNSBL Filters; from=<a@b>, to=<c@d>, proto=ESMTP, helo=<smtp.aweia.cn>"),
            Extraction::single(MetricEffect::IncrementLabeled(Metric::PostscreenRejects, vec!["550".to_string()]))
        );
        assert_eq!(
            reject("NOQUEUE: reject: RCPT from [209.85.160.43]:45612: 450 4.3.2 Service currently unavailable; from=account@gmail.com, to=user@abc.com, proto=ESMTP, helo=<mail-pl0-f43.google.com>"),
            Extraction::single(MetricEffect::IncrementLabeled(Metric::PostscreenRejects, vec!["450".to_string()]))
        );
    }

    #[test]
    fn screening_chatter_is_unmatched() {
        assert_eq!(reject("WHITELISTED [1.2.3.4]:12345"), Extraction::Unmatched);
        assert_eq!(reject("CONNECT from [1.2.3.4]:12345 to [5.6.7.8]:25"), Extraction::Unmatched);
    }
}
