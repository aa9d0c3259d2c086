//! `monitors.xml` reader and writer
//!
//! ```xml
//! <monitors version="1">
//!   <configuration>
//!       <clone>no</clone>
//!       <output name="eDP-1">
//!           <vendor>AUO</vendor>
//!           <product>0x1234</product>
//!           <serial>0x00000000</serial>
//!           <width>1920</width>
//!           ...
//!       </output>
//!   </configuration>
//! </monitors>
//! ```
//!
//! Older files have no `<monitors>` element and list `<configuration>`
//! elements at the top level. Unknown elements are skipped.

use std::fmt::Write as _;

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;
use tracing::warn;

use super::config::Configuration;
use super::output_info::OutputInfo;
use crate::screen::{Rotation, RotationFlag};

/// Why a document could not be read
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XmlError {
    /// Not well-formed XML
    #[error("malformed XML at byte {position}: {message}")]
    Syntax { position: u64, message: String },

    /// Well-formed, but not a monitors document
    #[error("{0}")]
    Content(String),
}

#[derive(Debug)]
struct OutputState {
    info: OutputInfo,
    turn: Option<RotationFlag>,
    reflect_x: bool,
    reflect_y: bool,
}

impl OutputState {
    fn finish(self) -> OutputInfo {
        let mut info = self.info;
        let turn = self.turn.unwrap_or(RotationFlag::Rotate0);
        info.set_rotation(Rotation::new(turn, self.reflect_x, self.reflect_y));
        info
    }
}

#[derive(Debug, Default)]
struct Parser {
    stack: Vec<String>,
    configs: Vec<Configuration>,
    clone: bool,
    outputs: Vec<OutputInfo>,
    output: Option<OutputState>,
    in_configuration: bool,
}

impl Parser {
    fn start(&mut self, element: &BytesStart<'_>) -> Result<(), XmlError> {
        let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();

        match (self.stack.last().map(String::as_str), name.as_str()) {
            (None, "monitors") => {
                let version = attribute(element, "version")?;
                if version.as_deref() != Some("1") {
                    return Err(XmlError::Content(format!(
                        "unsupported monitors version {}",
                        version.as_deref().unwrap_or("(none)")
                    )));
                }
            }
            (None | Some("monitors"), "configuration") => {
                self.in_configuration = true;
                self.clone = false;
                self.outputs.clear();
            }
            (Some("configuration"), "output") if self.in_configuration => {
                let output_name = attribute(element, "name")?.unwrap_or_else(|| {
                    warn!("Output element without a name in monitors file");
                    "unknown".to_string()
                });
                self.output = Some(OutputState {
                    info: OutputInfo::disconnected(output_name),
                    turn: None,
                    reflect_x: false,
                    reflect_y: false,
                });
            }
            (None, other) => {
                return Err(XmlError::Content(format!("unexpected root element <{other}>")));
            }
            _ => {}
        }

        self.stack.push(name);
        Ok(())
    }

    fn end(&mut self) {
        let Some(name) = self.stack.pop() else {
            return;
        };

        match name.as_str() {
            "output" if self.stack.last().map(String::as_str) == Some("configuration") => {
                if let Some(state) = self.output.take() {
                    self.outputs.push(state.finish());
                }
            }
            "configuration"
                if self.in_configuration
                    && matches!(self.stack.last().map(String::as_str), None | Some("monitors")) =>
            {
                self.in_configuration = false;
                let outputs = std::mem::take(&mut self.outputs);
                self.configs.push(Configuration::new(self.clone, outputs));
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) -> Result<(), XmlError> {
        let depth = self.stack.len();
        if depth < 2 {
            return Ok(());
        }
        let element = self.stack[depth - 1].as_str();
        let parent = self.stack[depth - 2].as_str();

        if parent == "configuration" && element == "clone" {
            self.clone = text == "yes";
            return Ok(());
        }

        if parent != "output" || depth < 3 || self.stack[depth - 3] != "configuration" {
            return Ok(());
        }
        let Some(state) = self.output.as_mut() else {
            return Ok(());
        };
        let info = &mut state.info;

        match element {
            "vendor" => {
                info.set_connected(true);
                info.set_vendor(text);
            }
            "product" => {
                info.set_connected(true);
                info.set_product(parse_number(element, text)?);
            }
            "serial" => {
                info.set_connected(true);
                info.set_serial(parse_number(element, text)?);
            }
            "width" | "height" | "x" | "y" | "rate" => {
                info.set_active(true);
                let value: i32 = parse_number(element, text)?;
                match element {
                    "width" => info.set_width(value),
                    "height" => info.set_height(value),
                    "rate" => info.set_refresh_rate(value),
                    "x" => {
                        let (_, y, _, _) = info.geometry();
                        info.set_position(value, y);
                    }
                    _ => {
                        let (x, _, _, _) = info.geometry();
                        info.set_position(x, value);
                    }
                }
            }
            "rotation" => state.turn = Rotation::turn_from_name(text),
            "reflect_x" => state.reflect_x = text == "yes",
            "reflect_y" => state.reflect_y = text == "yes",
            "primary" => info.set_primary(text == "yes"),
            _ => {}
        }

        Ok(())
    }
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>, XmlError> {
    let attr = element
        .try_get_attribute(name)
        .map_err(|e| XmlError::Content(e.to_string()))?;

    attr.map(|a| {
        a.unescape_value()
            .map(|v| v.into_owned())
            .map_err(|e| XmlError::Content(e.to_string()))
    })
    .transpose()
}

/// Parse an integer written in decimal, `0x` hexadecimal or `0` octal
fn parse_number<T>(element: &str, text: &str) -> Result<T, XmlError>
where
    T: TryFrom<i64>,
{
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let parsed = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8)
    } else {
        digits.parse::<i64>()
    };

    parsed
        .ok()
        .map(|value| if negative { -value } else { value })
        .and_then(|value| T::try_from(value).ok())
        .ok_or_else(|| XmlError::Content(format!("invalid number '{text}' in <{element}>")))
}

/// Read every configuration in a document
pub fn parse(document: &str) -> Result<Vec<Configuration>, XmlError> {
    let mut reader = Reader::from_str(document);
    reader.config_mut().trim_text(true);

    let mut parser = Parser::default();
    loop {
        let position = reader.buffer_position();
        let event = reader.read_event().map_err(|e| XmlError::Syntax {
            position: position as u64,
            message: e.to_string(),
        })?;

        match event {
            Event::Start(element) => parser.start(&element)?,
            Event::Empty(element) => {
                parser.start(&element)?;
                parser.end();
            }
            Event::End(_) => parser.end(),
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| XmlError::Syntax {
                    position: position as u64,
                    message: e.to_string(),
                })?;
                parser.text(text.trim())?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !parser.stack.is_empty() {
        return Err(XmlError::Syntax {
            position: document.len() as u64,
            message: format!("unclosed element <{}>", parser.stack.join("><")),
        });
    }

    Ok(parser.configs)
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn write_configuration(out: &mut String, config: &Configuration) {
    // Writing into a String cannot fail.
    let _ = writeln!(out, "  <configuration>");
    let _ = writeln!(out, "      <clone>{}</clone>", yes_no(config.is_clone()));

    for output in config.outputs() {
        let _ = writeln!(out, "      <output name=\"{}\">", escape(output.name()));

        if output.is_connected() {
            let _ = writeln!(out, "          <vendor>{}</vendor>", escape(output.vendor()));
            let _ = writeln!(out, "          <product>0x{:04x}</product>", output.product());
            let _ = writeln!(out, "          <serial>0x{:08x}</serial>", output.serial());
        }

        if output.is_connected() && output.is_active() {
            let (x, y, width, height) = output.geometry();
            let rotation = output.rotation();
            let _ = writeln!(out, "          <width>{width}</width>");
            let _ = writeln!(out, "          <height>{height}</height>");
            let _ = writeln!(out, "          <rate>{}</rate>", output.refresh_rate());
            let _ = writeln!(out, "          <x>{x}</x>");
            let _ = writeln!(out, "          <y>{y}</y>");
            let _ = writeln!(out, "          <rotation>{}</rotation>", rotation.turn_name());
            let _ = writeln!(out, "          <reflect_x>{}</reflect_x>", yes_no(rotation.reflect_x()));
            let _ = writeln!(out, "          <reflect_y>{}</reflect_y>", yes_no(rotation.reflect_y()));
            let _ = writeln!(out, "          <primary>{}</primary>", yes_no(output.is_primary()));
        }

        let _ = writeln!(out, "      </output>");
    }

    let _ = writeln!(out, "  </configuration>");
}

/// Write a version 1 document holding `configs`
pub fn serialize<'a>(configs: impl IntoIterator<Item = &'a Configuration>) -> String {
    let mut out = String::from("<monitors version=\"1\">\n");
    for config in configs {
        write_configuration(&mut out, config);
    }
    out.push_str("</monitors>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERSION_1: &str = r#"<monitors version="1">
  <configuration>
      <clone>no</clone>
      <output name="eDP-1">
          <vendor>AUO</vendor>
          <product>0x303d</product>
          <serial>0x00000000</serial>
          <width>1920</width>
          <height>1080</height>
          <rate>60</rate>
          <x>0</x>
          <y>0</y>
          <rotation>left</rotation>
          <reflect_x>yes</reflect_x>
          <reflect_y>no</reflect_y>
          <primary>yes</primary>
          <scale>2</scale>
      </output>
      <output name="VGA-1">
      </output>
  </configuration>
</monitors>
"#;

    #[test]
    fn test_parse_version_1() {
        let configs = parse(VERSION_1).unwrap();
        assert_eq!(configs.len(), 1);

        let config = &configs[0];
        assert!(!config.is_clone());

        let edp = config.output("eDP-1").unwrap();
        assert!(edp.is_connected());
        assert!(edp.is_active());
        assert_eq!(edp.vendor(), "AUO");
        assert_eq!(edp.product(), 0x303d);
        assert_eq!(edp.geometry(), (0, 0, 1920, 1080));
        assert_eq!(edp.rotation(), Rotation::new(RotationFlag::Rotate90, true, false));
        assert!(edp.is_primary());

        let vga = config.output("VGA-1").unwrap();
        assert!(!vga.is_connected());
        assert!(!vga.is_active());
    }

    #[test]
    fn test_parse_version_0() {
        let document = r#"
<configuration>
  <clone>yes</clone>
  <output name="LVDS"><vendor>LEN</vendor><width>1024</width><height>768</height></output>
</configuration>
<configuration>
  <clone>no</clone>
</configuration>
"#;
        let configs = parse(document).unwrap();
        assert_eq!(configs.len(), 2);
        assert!(configs[0].is_clone());
        assert_eq!(configs[0].output("LVDS").unwrap().geometry(), (-1, -1, 1024, 768));
        assert!(configs[1].outputs().is_empty());
    }

    #[test]
    fn test_connected_output_without_vendor_keeps_identity() {
        let mut out = OutputInfo::connected("DP-1", "", 0x1234, 7);
        out.set_active(true);
        out.set_geometry(0, 0, 1920, 1080);
        out.set_refresh_rate(60);
        let config = Configuration::new(false, vec![out]);

        let configs = parse(&serialize([&config])).unwrap();
        let loaded = configs[0].output("DP-1").unwrap();
        assert!(loaded.is_connected());
        assert_eq!(loaded.vendor(), "");
        assert_eq!(loaded.product(), 0x1234);
        assert_eq!(loaded.serial(), 7);
        assert!(crate::monitors::matching::equals(&configs[0], &config));
    }

    #[test]
    fn test_unknown_elements_ignored() {
        let document = r#"<monitors version="1"><configuration><clone>no</clone>
<output name="DP-1"><vendor>DEL</vendor><future><nested>1</nested></future></output>
<extension>whatever</extension>
</configuration></monitors>"#;
        let configs = parse(document).unwrap();
        assert_eq!(configs[0].outputs().len(), 1);
    }

    #[test]
    fn test_malformed_rejected() {
        assert!(matches!(
            parse("<monitors version=\"1\"><configuration>"),
            Err(XmlError::Syntax { .. })
        ));
        assert!(matches!(
            parse("<monitors version=\"2\"></monitors>"),
            Err(XmlError::Content(_))
        ));
        assert!(matches!(
            parse("<monitors version=\"1\"><configuration><output name=\"A\"><width>wide</width></output></configuration></monitors>"),
            Err(XmlError::Content(_))
        ));
    }

    #[test]
    fn test_serialize_layout() {
        let mut edp = OutputInfo::connected("eDP-1", "AUO", 0x303d, 7);
        edp.set_active(true);
        edp.set_geometry(0, 0, 1920, 1080);
        edp.set_refresh_rate(60);
        let vga = OutputInfo::disconnected("VGA-1");
        let config = Configuration::new(false, vec![edp, vga]);

        let document = serialize([&config]);
        assert!(document.starts_with("<monitors version=\"1\">\n  <configuration>\n      <clone>no</clone>\n"));
        assert!(document.contains("          <product>0x303d</product>\n"));
        assert!(document.contains("          <serial>0x00000007</serial>\n"));
        assert!(document.contains("      <output name=\"VGA-1\">\n      </output>\n"));
        assert!(document.ends_with("</monitors>\n"));
    }

    #[test]
    fn test_number_formats() {
        assert_eq!(parse_number::<i32>("x", "42").unwrap(), 42);
        assert_eq!(parse_number::<i32>("x", "-8").unwrap(), -8);
        assert_eq!(parse_number::<u16>("product", "0x303D").unwrap(), 0x303d);
        assert_eq!(parse_number::<i32>("x", "010").unwrap(), 8);
        assert!(parse_number::<u16>("product", "0x10000").is_err());
    }
}
