//! Testing utilities and fakes for the external seams.
//!
//! Provides a scripted [`MockFetcher`], an in-memory query engine and an
//! in-memory settings store, so the orchestrator and the result window can be
//! exercised without network or disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use mediathek_core::testing::{fixtures, MemoryQueryEngine, MemorySettings, MockFetcher, MockResponse};
//!
//! let fetcher = MockFetcher::new();
//! let payload = fixtures::catalog_payload(&[fixtures::show("ARD", "Tagesschau", "20 Uhr")]);
//! fetcher
//!     .set_response("http://mirror-a/Filmliste-akt.xz", MockResponse::chunked(&fixtures::compress(&payload), 512))
//!     .await;
//!
//! let engine = MemoryQueryEngine::new();
//! let settings = MemorySettings::new();
//! // Wire into UpdateOrchestrator...
//! ```

mod memory_engine;
mod memory_settings;
mod mock_fetcher;

pub use memory_engine::MemoryQueryEngine;
pub use memory_settings::MemorySettings;
pub use mock_fetcher::{MockFetcher, MockResponse, RecordedRequest};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::io::Write;

    use chrono::{NaiveDate, NaiveTime};
    use xz2::write::XzEncoder;

    use crate::database::Show;

    /// Create a show with reasonable defaults.
    pub fn show(channel: &str, topic: &str, title: &str) -> Show {
        Show {
            channel: channel.to_string(),
            topic: topic.to_string(),
            title: title.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap_or_default(),
            time: NaiveTime::from_hms_opt(20, 0, 0).unwrap_or_default(),
            duration: NaiveTime::from_hms_opt(0, 15, 0).unwrap_or_default(),
            description: format!("{} - {}", topic, title),
            website: format!("http://site.example/{}", channel),
            url: format!("http://media.example/{}/video.mp4", channel),
            url_small: None,
            url_large: None,
        }
    }

    /// Encode shows as a decoded Filmliste catalog payload.
    pub fn catalog_payload(shows: &[Show]) -> Vec<u8> {
        let mut payload = String::from(
            r#"{"Filmliste":["09.03.2024, 18:00","09.03.2024, 17:00","3","MSearch [Vers.: 3.1.219]","0123456789abcdef"],"Filmliste":["Sender","Thema","Titel","Datum","Zeit","Dauer","Größe [MB]","Beschreibung","Url","Website","Url Untertitel","Url RTMP","Url Klein","Url RTMP Klein","Url HD","Url RTMP HD","DatumL","Url History","Geo","neu"]"#,
        );

        for show in shows {
            let fields = [
                show.channel.clone(),
                show.topic.clone(),
                show.title.clone(),
                show.date.format("%d.%m.%Y").to_string(),
                show.time.format("%H:%M:%S").to_string(),
                show.duration.format("%H:%M:%S").to_string(),
                "100".to_string(),
                show.description.clone(),
                show.url.clone(),
                show.website.clone(),
                String::new(),
                String::new(),
                url_suffix(&show.url, show.url_small.as_deref()),
                String::new(),
                url_suffix(&show.url, show.url_large.as_deref()),
                String::new(),
                String::new(),
                String::new(),
                "DE".to_string(),
                "false".to_string(),
            ];

            payload.push_str(",\"X\":");
            payload.push_str(&serde_json::to_string(&fields).unwrap_or_default());
        }

        payload.push('}');
        payload.into_bytes()
    }

    /// Express `variant` as `<prefix length>|<tail>` relative to `url`.
    fn url_suffix(url: &str, variant: Option<&str>) -> String {
        let Some(variant) = variant else {
            return String::new();
        };

        let common = url
            .char_indices()
            .zip(variant.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map(|((index, c), _)| index + c.len_utf8())
            .unwrap_or(0);

        format!("{}|{}", common, &variant[common..])
    }

    /// xz-compress a payload.
    pub fn compress(payload: &[u8]) -> Vec<u8> {
        let mut encoder = XzEncoder::new(Vec::new(), 6);
        encoder
            .write_all(payload)
            .expect("in-memory xz encoding");
        encoder.finish().expect("in-memory xz encoding")
    }

    /// A mirror list document listing `mirrors`.
    pub fn mirror_list_document(mirrors: &[&str]) -> Vec<u8> {
        let mut document = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Mediathek>\n");
        for (prio, mirror) in mirrors.iter().enumerate() {
            document.push_str(&format!(
                "  <Server>\n    <URL>{}</URL>\n    <Prio>{}</Prio>\n  </Server>\n",
                mirror,
                prio + 1
            ));
        }
        document.push_str("</Mediathek>\n");
        document.into_bytes()
    }

}
