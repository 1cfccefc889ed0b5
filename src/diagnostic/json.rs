use super::{Diagnostic, Severity};

pub fn render(d: &Diagnostic) -> String {
    let severity = match d.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    };

    let mut obj = serde_json::json!({
        "severity": severity,
        "message": d.message,
        "notes": d.notes,
    });

    if let Some(pc) = d.pc {
        obj["pc"] = serde_json::Value::from(pc);
    }

    if let Some(s) = &d.suggestion {
        obj["suggestion"] = serde_json::Value::String(s.clone());
    }

    serde_json::to_string(&obj).unwrap_or_else(|_| {
        r#"{"severity":"error","message":"internal error serializing diagnostic"}"#.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::{Fault, FaultKind};

    fn parse_json(s: &str) -> serde_json::Value {
        serde_json::from_str(s).expect("valid JSON")
    }

    #[test]
    fn render_basic_error() {
        let d = Diagnostic::error("tag mismatch");
        let out = render(&d);
        let v = parse_json(&out);
        assert_eq!(v["severity"], "error");
        assert_eq!(v["message"], "tag mismatch");
        assert!(v["notes"].as_array().unwrap().is_empty());
        // No pc → no pc key.
        assert!(v.get("pc").is_none() || v["pc"].is_null());
    }

    #[test]
    fn render_fault_diagnostic() {
        let f = Fault::at(3, FaultKind::StackOverflow { limit: 8 });
        let out = render(&Diagnostic::from(&f));
        let v = parse_json(&out);
        assert_eq!(v["pc"], 3);
        assert_eq!(v["severity"], "error");
        assert!(v["suggestion"].is_string());
        assert!(!v["notes"].as_array().unwrap().is_empty());
    }

    #[test]
    fn render_with_suggestion() {
        let d = Diagnostic::error("bad").with_suggestion("try this instead");
        let v = parse_json(&render(&d));
        assert_eq!(v["suggestion"], "try this instead");
    }

    #[test]
    fn render_is_valid_json() {
        let d = Diagnostic::error("complex error")
            .at_pc(12)
            .with_note("some note")
            .with_suggestion("fix it");
        parse_json(&render(&d));
    }
}
