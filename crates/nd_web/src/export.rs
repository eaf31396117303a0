use chrono::NaiveDateTime;
use nd_core::{Article, Error, Result};

pub const CSV_HEADER: [&str; 4] = ["Title", "Author", "URL", "Crawled At"];
pub const CSV_FILENAME: &str = "articles.csv";
const CSV_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn csv_timestamp(at: Option<NaiveDateTime>) -> String {
    at.map(|at| at.format(CSV_TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}

/// Encodes articles as CSV with a header row. Missing values become empty
/// fields.
pub fn articles_to_csv(articles: &[Article]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(CSV_HEADER)
        .map_err(|e| Error::Export(e.to_string()))?;

    for article in articles {
        let crawled_at = csv_timestamp(article.crawled_at);
        writer
            .write_record([
                article.title.as_deref().unwrap_or_default(),
                article.author.as_deref().unwrap_or_default(),
                article.url.as_deref().unwrap_or_default(),
                crawled_at.as_str(),
            ])
            .map_err(|e| Error::Export(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| Error::Export(format!("Failed to flush CSV: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn parse(bytes: &[u8]) -> Vec<Vec<String>> {
        csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(bytes)
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_csv_header_only_for_empty_export() {
        let bytes = articles_to_csv(&[]).unwrap();
        assert_eq!(parse(&bytes), vec![CSV_HEADER.map(str::to_string).to_vec()]);
    }

    #[test]
    fn test_csv_nulls_are_empty_fields() {
        let at = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        let articles = vec![
            Article {
                id: 1,
                title: Some("Budget, \"final\" vote".to_string()),
                author: Some("bob".to_string()),
                url: Some("https://news.example/1".to_string()),
                crawled_at: Some(at),
            },
            Article {
                id: 2,
                title: None,
                author: None,
                url: None,
                crawled_at: None,
            },
        ];

        let bytes = articles_to_csv(&articles).unwrap();
        let records = parse(&bytes);
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.len() == 4));
        assert_eq!(
            records[1],
            vec!["Budget, \"final\" vote", "bob", "https://news.example/1", "2024-05-01 08:30:00"]
        );
        assert_eq!(records[2], vec!["", "", "", ""]);

        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains("None"));
        assert!(!text.contains("null"));
    }
}
