//! `server.properties` rendering and the properties aggregate.

use std::{collections::BTreeMap, fs, io::Write, path::Path};

use mcsc_model::RuntimeProperties;
use serde_json::Value;

use crate::{
    aggregate::AggregateKind,
    controller::ServerController,
    error::{Result, ServerError},
};

fn escape(raw: &str, out: &mut String) {
    for (i, c) in raw.chars().enumerate() {
        match c {
            '\\' | ':' | '=' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            ' ' if i == 0 => out.push_str("\\ "),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
}

/// Renders the properties in Java `.properties` syntax, one `key=value` line
/// per field in key order, after a two-line comment header.
pub fn render_server_properties(props: &RuntimeProperties, stamp: &str) -> Result<String> {
    let value = serde_json::to_value(props).map_err(|source| ServerError::Encode {
        kind: AggregateKind::Properties,
        source,
    })?;
    let Value::Object(map) = value else {
        return Ok(String::new());
    };
    let sorted: BTreeMap<String, Value> = map.into_iter().collect();

    let mut out = String::from("#Minecraft server properties\n");
    out.push('#');
    out.push_str(stamp);
    out.push('\n');
    for (key, value) in sorted {
        escape(&key, &mut out);
        out.push('=');
        match value {
            Value::Null => {}
            Value::String(s) => escape(&s, &mut out),
            other => escape(&other.to_string(), &mut out),
        }
        out.push('\n');
    }
    Ok(out)
}

pub fn write_server_properties(path: &Path, props: &RuntimeProperties) -> Result<()> {
    let stamp = chrono::Local::now()
        .format("%a %b %d %H:%M:%S %Z %Y")
        .to_string();
    let rendered = render_server_properties(props, &stamp)?;
    let tmp = path.with_extension("properties.tmp");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(rendered.as_bytes())?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

impl ServerController {
    pub async fn properties(&self) -> Result<RuntimeProperties> {
        self.state.lock().await.properties.get()
    }

    /// Replaces the stored properties. The running server only picks them up
    /// on its next start.
    pub async fn set_properties(&self, props: RuntimeProperties) {
        self.state.lock().await.properties.set(props);
    }
}
