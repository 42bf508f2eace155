//! Retrieved filing excerpts

use serde::{Deserialize, Serialize};

/// A retrieved excerpt with relevance score and provenance
///
/// Field names on the wire follow the index metadata schema
/// (`score`, `text_content`, `section_header`, `source_url`, `year`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Vector id in the index
    pub id: String,
    /// Similarity score reported by the store (higher is more similar)
    #[serde(rename = "score")]
    pub relevance_score: f32,
    /// Excerpt text
    #[serde(rename = "text_content")]
    pub text: String,
    /// Filing section, e.g. "Risk Factors"
    #[serde(rename = "section_header")]
    pub section_label: String,
    /// Link to the source filing
    #[serde(rename = "source_url")]
    pub source_uri: String,
    /// Fiscal year of the filing
    #[serde(rename = "year")]
    pub period: String,
}

/// Section label used when the index metadata carries none
pub const UNKNOWN_SECTION: &str = "Unknown Section";

impl Passage {
    /// Build a passage from raw index metadata, filling in defaults
    pub fn from_metadata(
        id: impl Into<String>,
        relevance_score: f32,
        metadata: &serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            relevance_score,
            text: metadata_text(metadata, "text_content").unwrap_or_default(),
            section_label: metadata_text(metadata, "section_header")
                .unwrap_or_else(|| UNKNOWN_SECTION.to_string()),
            source_uri: metadata_text(metadata, "source_url").unwrap_or_default(),
            period: metadata_text(metadata, "year").unwrap_or_default(),
        }
    }
}

/// Read a metadata field as text; numbers are rendered, other types ignored
fn metadata_text(
    metadata: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Option<String> {
    match metadata.get(key)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.to_string(),
        }),
        _ => None,
    }
}

/// Sort passages by descending relevance, keeping retrieval order for ties
pub fn sort_by_relevance(passages: &mut [Passage]) {
    passages.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_metadata_defaults() {
        let meta = json!({ "text_content": "Revenue grew 8%", "year": 2023 });
        let passage = Passage::from_metadata("p1", 0.82, meta.as_object().unwrap());

        assert_eq!(passage.text, "Revenue grew 8%");
        assert_eq!(passage.section_label, UNKNOWN_SECTION);
        assert_eq!(passage.source_uri, "");
        assert_eq!(passage.period, "2023");
    }

    #[test]
    fn test_wire_field_names() {
        let passage = Passage {
            id: "p1".into(),
            relevance_score: 0.5,
            text: "t".into(),
            section_label: "Risk Factors".into(),
            source_uri: "https://sec.gov/x".into(),
            period: "2023".into(),
        };
        let value = serde_json::to_value(&passage).unwrap();
        assert_eq!(value["score"], json!(0.5));
        assert_eq!(value["text_content"], "t");
        assert_eq!(value["section_header"], "Risk Factors");
        assert_eq!(value["source_url"], "https://sec.gov/x");
        assert_eq!(value["year"], "2023");
    }

    #[test]
    fn test_sort_by_relevance() {
        let mk = |id: &str, score: f32| Passage {
            id: id.into(),
            relevance_score: score,
            text: String::new(),
            section_label: String::new(),
            source_uri: String::new(),
            period: String::new(),
        };
        let mut passages = vec![mk("a", 0.2), mk("b", 0.9), mk("c", 0.5), mk("d", 0.9)];
        sort_by_relevance(&mut passages);
        let ids: Vec<&str> = passages.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "c", "a"]);
    }
}
