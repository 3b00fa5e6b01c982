//! Index-engine wire codec
//!
//! Records are serialized as `<add><doc>…</doc></add>` with one
//! `<field name="…">value</field>` element per field value; deletions as
//! `<delete><id>ID</id><query>dataset_id:"ID"</query></delete>` where the
//! `<query>` clause cascades removal of children keyed by parent id. A
//! commit or optimize directive follows a batch. Responses come back as
//! `<response><result numFound="N" start="S"><doc>…</doc></result>…` with
//! an optional `<lst name="facet_counts">` block.

use indexmap::IndexMap;

use super::query::{FacetOption, QueryResult};
use super::IndexError;
use crate::models::{Record, RecordType};

/// Commit directive sent after a batch
pub const COMMIT: &str = "<commit/>";

/// Optimize directive
pub const OPTIMIZE: &str = "<optimize/>";

/// Reserved field names carrying record attributes on the wire
mod attr {
    pub const ID: &str = "id";
    pub const TYPE: &str = "type";
    pub const MASTER_ID: &str = "master_id";
    pub const VERSION: &str = "version";
    pub const LATEST: &str = "latest";
    pub const REPLICA: &str = "replica";
}

/// Escape a value for placement in XML text content
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn push_field(out: &mut String, name: &str, value: &str) {
    out.push_str("<field name=\"");
    out.push_str(&escape(name));
    out.push_str("\">");
    out.push_str(&escape(value));
    out.push_str("</field>");
}

/// Serialize a record batch as one `<add>` command
pub fn serialize_add(records: &[Record]) -> String {
    let mut out = String::from("<add>");

    for record in records {
        out.push_str("<doc>");
        push_field(&mut out, attr::ID, &record.id);
        push_field(&mut out, attr::TYPE, record.record_type.as_str());
        push_field(&mut out, attr::MASTER_ID, &record.master_id);
        push_field(&mut out, attr::VERSION, &record.version.to_string());
        push_field(&mut out, attr::LATEST, if record.latest { "true" } else { "false" });
        push_field(&mut out, attr::REPLICA, if record.replica { "true" } else { "false" });

        for (name, values) in &record.fields {
            for value in values {
                push_field(&mut out, name, value);
            }
        }
        out.push_str("</doc>");
    }

    out.push_str("</add>");
    out
}

/// Quote a value as one query term, backslash-escaping embedded quotes
/// and backslashes so ids with spaces or colons stay a single term
fn quote_term(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Serialize a deletion command for the given record ids.
///
/// Each id is deleted directly and again by a `dataset_id` query so the
/// engine cascades removal of child records keyed on the parent id.
pub fn serialize_delete(ids: &[String]) -> String {
    let mut out = String::from("<delete>");

    for id in ids {
        out.push_str("<id>");
        out.push_str(&escape(id));
        out.push_str("</id>");
        out.push_str("<query>dataset_id:");
        out.push_str(&escape(&quote_term(id)));
        out.push_str("</query>");
    }

    out.push_str("</delete>");
    out
}

/// Parse an engine query response
pub fn parse_response(xml: &str) -> Result<QueryResult, IndexError> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| IndexError::MalformedResponse(e.to_string()))?;

    let root = doc.root_element();
    if root.tag_name().name() != "response" {
        return Err(IndexError::MalformedResponse(format!(
            "root element is <{}>, expected <response>",
            root.tag_name().name()
        )));
    }

    let result_node = root
        .children()
        .filter(|n| n.is_element())
        .find(|n| n.tag_name().name() == "result")
        .ok_or_else(|| IndexError::MalformedResponse("missing <result> element".to_string()))?;

    let num_found = result_node
        .attribute("numFound")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| IndexError::MalformedResponse("missing numFound attribute".to_string()))?;

    let start = result_node
        .attribute("start")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let mut records = Vec::new();
    for doc_node in result_node
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "doc")
    {
        records.push(parse_doc(doc_node)?);
    }

    let facets = parse_facet_counts(root);

    Ok(QueryResult {
        num_found,
        start,
        records,
        facets,
    })
}

/// Parse one `<doc>` into a record.
///
/// Values appear either as single typed elements (`<str name="id">…`) or
/// as `<arr name="…">` wrapping repeated values; both forms are folded
/// into the multi-valued field map, then the reserved attribute fields
/// are lifted out.
fn parse_doc(node: roxmltree::Node<'_, '_>) -> Result<Record, IndexError> {
    let mut fields: IndexMap<String, Vec<String>> = IndexMap::new();

    for child in node.children().filter(|n| n.is_element()) {
        let Some(name) = child.attribute("name") else {
            continue;
        };

        if child.tag_name().name() == "arr" {
            for item in child.children().filter(|n| n.is_element()) {
                if let Some(text) = item.text() {
                    fields.entry(name.to_string()).or_default().push(text.to_string());
                }
            }
        } else if let Some(text) = child.text() {
            fields.entry(name.to_string()).or_default().push(text.to_string());
        }
    }

    let take_first = |fields: &mut IndexMap<String, Vec<String>>, name: &str| {
        fields.shift_remove(name).and_then(|mut v| {
            if v.is_empty() {
                None
            } else {
                Some(v.swap_remove(0))
            }
        })
    };

    let id = take_first(&mut fields, attr::ID)
        .ok_or_else(|| IndexError::MalformedResponse("doc without id field".to_string()))?;

    let record_type = take_first(&mut fields, attr::TYPE)
        .as_deref()
        .and_then(RecordType::parse)
        .unwrap_or(RecordType::Dataset);

    let master_id = take_first(&mut fields, attr::MASTER_ID).unwrap_or_else(|| id.clone());
    let version = take_first(&mut fields, attr::VERSION)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let latest = take_first(&mut fields, attr::LATEST).as_deref() == Some("true");
    let replica = take_first(&mut fields, attr::REPLICA).as_deref() == Some("true");

    Ok(Record {
        id,
        record_type,
        master_id,
        version,
        latest,
        replica,
        fields,
    })
}

/// Parse the `<lst name="facet_counts"><lst name="facet_fields">…` block
fn parse_facet_counts(root: roxmltree::Node<'_, '_>) -> IndexMap<String, Vec<FacetOption>> {
    let mut facets = IndexMap::new();

    let Some(counts) = root
        .children()
        .filter(|n| n.is_element())
        .find(|n| n.tag_name().name() == "lst" && n.attribute("name") == Some("facet_counts"))
    else {
        return facets;
    };

    let Some(fields) = counts
        .children()
        .filter(|n| n.is_element())
        .find(|n| n.tag_name().name() == "lst" && n.attribute("name") == Some("facet_fields"))
    else {
        return facets;
    };

    for field in fields
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "lst")
    {
        let Some(field_name) = field.attribute("name") else {
            continue;
        };

        let options: Vec<FacetOption> = field
            .children()
            .filter(|n| n.is_element())
            .filter_map(|n| {
                let value = n.attribute("name")?.to_string();
                let count = n.text()?.parse().ok()?;
                Some(FacetOption { value, count })
            })
            .collect();

        facets.insert(field_name.to_string(), options);
    }

    facets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> Record {
        let mut record = Record::new("cmip5.output1.tas.v2|host", RecordType::Dataset)
            .with_master_id("cmip5.output1.tas")
            .with_version(2);
        record.add_field("project", "CMIP5");
        record.add_field("variable", "tas");
        record.add_field("variable", "pr");
        record
    }

    #[test]
    fn test_serialize_add_shape() {
        let xml = serialize_add(&[sample_record()]);

        assert!(xml.starts_with("<add><doc>"));
        assert!(xml.ends_with("</doc></add>"));
        assert!(xml.contains(r#"<field name="id">cmip5.output1.tas.v2|host</field>"#));
        assert!(xml.contains(r#"<field name="type">Dataset</field>"#));
        assert!(xml.contains(r#"<field name="master_id">cmip5.output1.tas</field>"#));
        assert!(xml.contains(r#"<field name="version">2</field>"#));
        assert!(xml.contains(r#"<field name="latest">true</field>"#));
        assert!(xml.contains(r#"<field name="replica">false</field>"#));
        // repeated elements for multi-valued fields
        assert_eq!(xml.matches(r#"<field name="variable">"#).count(), 2);
    }

    #[test]
    fn test_serialize_escapes_values() {
        let mut record = sample_record();
        record.add_field("title", "Temperature & <pressure>");
        let xml = serialize_add(&[record]);

        assert!(xml.contains("Temperature &amp; &lt;pressure&gt;"));
    }

    #[test]
    fn test_serialize_delete_cascades() {
        let xml = serialize_delete(&["ds.v1|host".to_string()]);
        assert_eq!(
            xml,
            "<delete><id>ds.v1|host</id><query>dataset_id:&quot;ds.v1|host&quot;</query></delete>"
        );
    }

    #[test]
    fn test_delete_query_keeps_metacharacters_in_one_term() {
        // spaces and colons must stay inside the quoted cascade term
        let xml = serialize_delete(&["obs4MIPs.nasa gov:ds.v1".to_string()]);
        assert!(xml.contains("<id>obs4MIPs.nasa gov:ds.v1</id>"));
        assert!(xml.contains("<query>dataset_id:&quot;obs4MIPs.nasa gov:ds.v1&quot;</query>"));

        // embedded quotes are backslash-escaped within the term
        let xml = serialize_delete(&[r#"ds."odd".v1"#.to_string()]);
        assert!(xml.contains(r#"<query>dataset_id:&quot;ds.\&quot;odd\&quot;.v1&quot;</query>"#));
    }

    const RESPONSE: &str = r#"<?xml version="1.0"?>
<response>
  <result numFound="2" start="0">
    <doc>
      <str name="id">cmip5.tas.v1|host</str>
      <str name="type">Dataset</str>
      <str name="master_id">cmip5.tas</str>
      <long name="version">1</long>
      <bool name="latest">true</bool>
      <bool name="replica">false</bool>
      <str name="project">CMIP5</str>
      <arr name="variable"><str>tas</str><str>pr</str></arr>
    </doc>
    <doc>
      <str name="id">cmip5.pr.v3|host</str>
      <str name="type">Dataset</str>
      <long name="version">3</long>
    </doc>
  </result>
  <lst name="facet_counts">
    <lst name="facet_fields">
      <lst name="project">
        <int name="CMIP5">12</int>
        <int name="obs4MIPs">3</int>
      </lst>
    </lst>
  </lst>
</response>"#;

    #[test]
    fn test_parse_response_records() {
        let result = parse_response(RESPONSE).unwrap();

        assert_eq!(result.num_found, 2);
        assert_eq!(result.start, 0);
        assert_eq!(result.records.len(), 2);

        let first = &result.records[0];
        assert_eq!(first.id, "cmip5.tas.v1|host");
        assert_eq!(first.master_id, "cmip5.tas");
        assert_eq!(first.version, 1);
        assert!(first.latest);
        assert_eq!(first.values("variable"), ["tas", "pr"]);
        assert_eq!(first.first_value("project"), Some("CMIP5"));
        // lifted attributes are not duplicated in the field map
        assert!(first.fields.get("id").is_none());

        let second = &result.records[1];
        assert_eq!(second.master_id, "cmip5.pr.v3|host");
        assert!(!second.latest);
    }

    #[test]
    fn test_parse_response_facets() {
        let result = parse_response(RESPONSE).unwrap();

        let project = result.facets.get("project").unwrap();
        assert_eq!(project.len(), 2);
        assert_eq!(project[0].value, "CMIP5");
        assert_eq!(project[0].count, 12);
    }

    #[test]
    fn test_parse_rejects_missing_result() {
        let err = parse_response("<response></response>");
        assert!(matches!(err, Err(IndexError::MalformedResponse(_))));
    }

    #[test]
    fn test_field_order_on_wire() {
        // attribute fields first, then the field map in insertion order
        let xml = serialize_add(&[sample_record()]);
        let project_pos = xml.find(r#"name="project""#).unwrap();
        let variable_pos = xml.find(r#"name="variable""#).unwrap();
        let id_pos = xml.find(r#"name="id""#).unwrap();
        assert!(id_pos < project_pos);
        assert!(project_pos < variable_pos);
    }
}
