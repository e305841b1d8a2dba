use std::io::Write;

use cmk_error::{CheckmkError, Result};
use serde::{Deserialize, Serialize};

/// Maximum length of a section name
pub const MAX_SECTION_NAME_LENGTH: usize = 64;

/// Maximum length of a piggyback host name
const MAX_HOST_NAME_LENGTH: usize = 253;

const SECTION_OPEN: &str = "<<<";
const SECTION_CLOSE: &str = ">>>";
const PIGGYBACK_OPEN: &str = "<<<<";
const PIGGYBACK_CLOSE: &str = ">>>>";

/// Separator of `sep(0)` sections: every line is one column
pub const SEP_NONE: char = '\0';

/// Section names are lowercase ASCII letters, digits and underscores
pub fn validate_section_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CheckmkError::InvalidSectionName("empty name".into()));
    }
    if name.len() > MAX_SECTION_NAME_LENGTH {
        return Err(CheckmkError::InvalidSectionName(format!(
            "'{}' is longer than {} characters",
            name, MAX_SECTION_NAME_LENGTH
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_'))
    {
        return Err(CheckmkError::InvalidSectionName(format!(
            "'{}' contains invalid character {:?}",
            name, c
        )));
    }
    Ok(())
}

/// Make a host name usable inside a piggyback header
///
/// Whitespace and anything outside `[A-Za-z0-9._-]` becomes `_`.
pub fn sanitize_piggyback_host(host: &str) -> Result<String> {
    let trimmed = host.trim();
    if trimmed.is_empty() {
        return Err(CheckmkError::invalid_params("piggyback host", "empty host name"));
    }
    if trimmed.len() > MAX_HOST_NAME_LENGTH {
        return Err(CheckmkError::invalid_params(
            "piggyback host",
            format!("host name longer than {} characters", MAX_HOST_NAME_LENGTH),
        ));
    }
    Ok(trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect())
}

/// Header line of a section: `<<<name>>>` or `<<<name:sep(N)>>>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionHeader {
    pub name: String,
    /// Column separator; `None` splits on whitespace
    pub separator: Option<char>,
    /// Header options other than `sep`, kept verbatim
    #[serde(default)]
    pub options: Vec<String>,
}

impl SectionHeader {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_section_name(&name)?;
        Ok(Self {
            name,
            separator: None,
            options: Vec::new(),
        })
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = Some(separator);
        self
    }

    /// Header of a JSON-lines section (`sep(0)`)
    pub fn json_lines(name: impl Into<String>) -> Result<Self> {
        Ok(Self::new(name)?.with_separator(SEP_NONE))
    }

    pub fn render(&self) -> String {
        let mut out = format!("{}{}", SECTION_OPEN, self.name);
        if let Some(sep) = self.separator {
            out.push_str(&format!(":sep({})", sep as u32));
        }
        for option in &self.options {
            out.push(':');
            out.push_str(option);
        }
        out.push_str(SECTION_CLOSE);
        out
    }

    /// Parse a header line; piggyback lines are not section headers
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end();
        let inner = line
            .strip_prefix(SECTION_OPEN)
            .and_then(|l| l.strip_suffix(SECTION_CLOSE))
            .filter(|_| !is_piggyback_line(line))
            .ok_or_else(|| CheckmkError::InvalidSectionHeader(line.to_string()))?;

        let mut parts = inner.split(':');
        let name = parts.next().unwrap_or_default();
        let mut header = Self::new(name)?;

        for option in parts {
            match option
                .strip_prefix("sep(")
                .and_then(|o| o.strip_suffix(')'))
            {
                Some(code) => {
                    let sep = code
                        .parse::<u32>()
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or_else(|| CheckmkError::InvalidSectionHeader(line.to_string()))?;
                    header.separator = Some(sep);
                }
                None => header.options.push(option.to_string()),
            }
        }
        Ok(header)
    }

    /// Split a data line into columns according to the separator
    pub fn split_row(&self, line: &str) -> Vec<String> {
        match self.separator {
            None => line.split_whitespace().map(str::to_string).collect(),
            Some(SEP_NONE) => vec![line.to_string()],
            Some(sep) => line.split(sep).map(str::to_string).collect(),
        }
    }
}

fn is_piggyback_line(line: &str) -> bool {
    line.starts_with(PIGGYBACK_OPEN) && line.ends_with(PIGGYBACK_CLOSE)
}

fn write_line<W: Write>(out: &mut W, line: &str) -> Result<()> {
    if line.contains('\n') {
        return Err(CheckmkError::generic(format!(
            "section line must not contain a newline: {:?}",
            line
        )));
    }
    writeln!(out, "{}", line)?;
    Ok(())
}

/// Writes one section: the header on creation, then rows
pub struct SectionWriter<W: Write> {
    out: W,
    header: SectionHeader,
    rows: usize,
}

impl<W: Write> SectionWriter<W> {
    pub fn new(mut out: W, header: SectionHeader) -> Result<Self> {
        write_line(&mut out, &header.render())?;
        Ok(Self {
            out,
            header,
            rows: 0,
        })
    }

    /// Append a raw line
    pub fn append(&mut self, line: &str) -> Result<()> {
        write_line(&mut self.out, line)?;
        self.rows += 1;
        Ok(())
    }

    /// Append columns joined by the section separator
    pub fn append_row<S: AsRef<str>>(&mut self, columns: &[S]) -> Result<()> {
        let sep = match self.header.separator {
            None | Some(SEP_NONE) => ' ',
            Some(sep) => sep,
        }
        .to_string();
        let line = columns
            .iter()
            .map(|c| c.as_ref())
            .collect::<Vec<&str>>()
            .join(sep.as_str());
        self.append(&line)
    }

    /// Append one compact JSON document as a line
    pub fn append_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let line = serde_json::to_string(value)?;
        self.append(&line)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Wraps sections written on behalf of another host
///
/// Writes `<<<<host>>>>` on creation and `<<<<>>>>` on [`finish`](Self::finish).
pub struct PiggybackWriter<W: Write> {
    out: W,
    host: String,
}

impl<W: Write> PiggybackWriter<W> {
    pub fn new(mut out: W, host: &str) -> Result<Self> {
        let host = sanitize_piggyback_host(host)?;
        write_line(&mut out, &format!("{}{}{}", PIGGYBACK_OPEN, host, PIGGYBACK_CLOSE))?;
        Ok(Self { out, host })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Start a section inside the piggyback block
    pub fn section(&mut self, header: SectionHeader) -> Result<SectionWriter<&mut W>> {
        SectionWriter::new(&mut self.out, header)
    }

    /// Close the block and hand back the writer
    pub fn finish(mut self) -> Result<W> {
        write_line(&mut self.out, &format!("{}{}", PIGGYBACK_OPEN, PIGGYBACK_CLOSE))?;
        Ok(self.out)
    }
}

impl<W: Write> Write for PiggybackWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.out.flush()
    }
}

/// A section read back from agent output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedSection {
    /// Piggyback host the section belongs to, `None` for the source host
    pub piggyback: Option<String>,
    pub header: SectionHeader,
    pub rows: Vec<Vec<String>>,
}

/// Split agent output into sections
///
/// Lines before the first header, lines after an invalid header and empty
/// lines are ignored. `<<<<>>>>` returns to the source host.
pub fn parse_agent_output(text: &str) -> Vec<ParsedSection> {
    let mut sections: Vec<ParsedSection> = Vec::new();
    let mut piggyback: Option<String> = None;
    let mut in_section = false;

    for raw in text.lines() {
        let line = raw.trim_end_matches('\r');

        if is_piggyback_line(line) {
            let host = &line[PIGGYBACK_OPEN.len()..line.len() - PIGGYBACK_CLOSE.len()];
            piggyback = if host.trim().is_empty() {
                None
            } else {
                Some(host.trim().to_string())
            };
            in_section = false;
            continue;
        }

        if line.starts_with(SECTION_OPEN) && line.trim_end().ends_with(SECTION_CLOSE) {
            match SectionHeader::parse(line) {
                Ok(header) => {
                    sections.push(ParsedSection {
                        piggyback: piggyback.clone(),
                        header,
                        rows: Vec::new(),
                    });
                    in_section = true;
                }
                Err(_) => in_section = false,
            }
            continue;
        }

        if !in_section || line.trim().is_empty() {
            continue;
        }
        if let Some(section) = sections.last_mut() {
            let row = section.header.split_row(line);
            section.rows.push(row);
        }
    }
    sections
}

/// Rows of each named section for one host, in the order of `names`
///
/// Repeated sections of the same name are concatenated; absent ones yield
/// an empty table.
pub fn section_tables(
    sections: &[ParsedSection],
    names: &[&str],
    piggyback: Option<&str>,
) -> Vec<Vec<Vec<String>>> {
    names
        .iter()
        .map(|name| {
            sections
                .iter()
                .filter(|s| s.header.name == *name && s.piggyback.as_deref() == piggyback)
                .flat_map(|s| s.rows.iter().cloned())
                .collect()
        })
        .collect()
}
