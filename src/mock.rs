//! Deterministic placeholder report used when the live pipeline is unavailable.

use chrono::{Days, NaiveDate};

const DATE_FORMAT: &str = "%B %d, %Y";

/// Render a mock news report for `subject`.
///
/// `notes` are the reasons the live path was skipped (missing credential
/// names, or a pipeline error); they end up in the footer. The output only
/// depends on the arguments, so equal inputs give byte-identical reports.
pub fn mock_news(subject: &str, notes: &[String], today: NaiveDate) -> String {
    let today_str = format_date(today);
    let yesterday_str = format_date(days_before(today, 1));
    let two_days_ago_str = format_date(days_before(today, 2));

    let mut report = format!(
        r#"
# News Results for: {subject}

## Top Headlines

### {subject} Makes Waves in Technology Sector
*{today_str}* - Lorem ipsum dolor sit amet, consectetur adipiscing elit.
Nullam euismod, nisl eget aliquam ultricies, nunc nisl aliquet nunc, quis
aliquam nisl nunc eu nisl. Nullam euismod, nisl eget aliquam ultricies.

### New Developments in {subject} Research
*{yesterday_str}* - Praesent euismod, nisl eget aliquam ultricies, nunc nisl
aliquet nunc, quis aliquam nisl nunc eu nisl. Nullam euismod, nisl eget
aliquam ultricies, nunc nisl aliquet nunc.

### {subject} Industry Sees Record Growth
*{two_days_ago_str}* - Vestibulum ante ipsum primis in faucibus orci luctus et
ultrices posuere cubilia curae; Nullam euismod, nisl eget aliquam ultricies,
nunc nisl aliquet nunc, quis aliquam nisl nunc eu nisl.

## Related Stories

- **Expert Analysis**: What {subject} Means for the Future
- **Opinion**: Why {subject} Matters in Today's World
- **Market Impact**: How {subject} is Changing Industries

## Trending Topics Related to {subject}

1. {subject} Innovation
2. {subject} Technology
3. {subject} Market Trends
4. Future of {subject}

---

"#
    );

    if notes.is_empty() {
        report.push_str(
            "*Note: This is a mock response. Real news search functionality is not available at this time.*",
        );
    } else {
        report.push_str(&format!(
            "*Note: This is a mock response because the following API keys are missing: {}. ",
            notes.join(", ")
        ));
        report.push_str(
            "Please ensure these keys are set in your .env file to enable real news search.*",
        );
    }

    report
}

/// Calendar subtraction; saturates at the earliest representable date.
fn days_before(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_sub_days(Days::new(days)).unwrap_or(date)
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn headings(report: &str) -> Vec<&str> {
        report.lines().filter(|l| l.starts_with('#')).collect()
    }

    #[test]
    fn subject_appears_in_every_templated_heading() {
        let report = mock_news("climate", &[], date(2025, 6, 15));
        let with_subject: Vec<_> = headings(&report)
            .into_iter()
            .filter(|h| h.contains("climate"))
            .collect();
        // Title, three headlines, trending topics.
        assert_eq!(with_subject.len(), 5);
        assert!(report.contains("What climate Means for the Future"));
        assert!(report.contains("4. Future of climate"));
    }

    #[test]
    fn footer_lists_every_note() {
        let notes = vec!["SERPER_API_KEY".to_string(), "OPENAI_API_KEY".to_string()];
        let report = mock_news("climate", &notes, date(2025, 6, 15));
        let footer = report.lines().last().unwrap();
        assert!(footer.contains("SERPER_API_KEY, OPENAI_API_KEY"));
        assert!(footer.contains("are missing"));
    }

    #[test]
    fn generic_footer_without_notes() {
        let report = mock_news("rust", &[], date(2025, 6, 15));
        assert!(report.ends_with(
            "*Note: This is a mock response. Real news search functionality is not available at this time.*"
        ));
    }

    #[test]
    fn dates_roll_over_month_and_year() {
        let report = mock_news("x", &[], date(2025, 1, 1));
        assert!(report.contains("*January 01, 2025*"));
        assert!(report.contains("*December 31, 2024*"));
        assert!(report.contains("*December 30, 2024*"));

        let leap = mock_news("x", &[], date(2024, 3, 1));
        assert!(leap.contains("*February 29, 2024*"));
        assert!(leap.contains("*February 28, 2024*"));
    }

    #[test]
    fn deterministic_for_equal_inputs() {
        let notes = vec!["OPENAI_API_KEY".to_string()];
        let a = mock_news("ai", &notes, date(2025, 5, 2));
        let b = mock_news("ai", &notes, date(2025, 5, 2));
        assert_eq!(a, b);
    }

    #[test]
    fn odd_subjects_are_embedded_verbatim() {
        let long = "z".repeat(10_000);
        for subject in ["", "**bold** _x_ # [link](y) `code` {braces}", long.as_str()] {
            let report = mock_news(subject, &[], date(2025, 6, 15));
            assert!(report.contains(&format!("# News Results for: {}", subject)));
        }
    }
}
