//! JSON Schemas of tool arguments

use crate::engines::OperationKind;
use serde_json::{json, Value};

/// Input schema of the tool published for `kind`
pub fn input_schema(kind: OperationKind) -> Value {
    match kind {
        OperationKind::WebpageScrape => scrape_schema(),
        OperationKind::LensSearch => search_schema("URL of the image to search with"),
        OperationKind::AutocompleteSearch => search_schema("Partial query to complete"),
        _ => search_schema("Search query"),
    }
}

fn search_schema(query_description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "minLength": 1,
                "description": query_description
            },
            "location": {
                "type": "string",
                "description": "Location to search from, e.g. \"Austin, Texas, United States\""
            },
            "language": {
                "type": "string",
                "description": "Interface language code, e.g. \"en\""
            },
            "country": {
                "type": "string",
                "description": "Country code, e.g. \"us\""
            },
            "num_results": {
                "type": "integer",
                "minimum": 1,
                "maximum": 100,
                "description": "Number of results to return"
            },
            "options": {
                "type": "object",
                "description": "Provider specific parameters passed through unchanged",
                "additionalProperties": {
                    "type": ["string", "number", "boolean"]
                }
            }
        },
        "required": ["query"]
    })
}

fn scrape_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "url": {
                "type": "string",
                "format": "uri",
                "description": "Absolute http(s) URL of the page to scrape"
            }
        },
        "required": ["url"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schemas() {
        let web = input_schema(OperationKind::WebSearch);
        assert_eq!(web["required"], json!(["query"]));
        assert_eq!(web["properties"]["num_results"]["type"], "integer");

        let scrape = input_schema(OperationKind::WebpageScrape);
        assert_eq!(scrape["required"], json!(["url"]));
        assert!(scrape["properties"].get("query").is_none());

        let lens = input_schema(OperationKind::LensSearch);
        assert!(lens["properties"]["query"]["description"]
            .as_str()
            .unwrap()
            .contains("image"));
    }
}
