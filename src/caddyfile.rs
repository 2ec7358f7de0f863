//! Structured model of the shared Caddyfile
//!
//! The routing configuration is a plain text file that is also read and
//! edited by operators and by the proxy itself, so the file format is the
//! wire format. Instead of querying the raw text with patterns, each request
//! parses the file once into this model, runs its lookups against the model,
//! and re-serializes deterministically on write.

use std::collections::HashSet;

/// Comment line preceding a batch of site blocks, recording where the batch
/// came from. Serialized as a single line:
///
/// `# registration 12 backend=203.0.113.7 machine=mach-01 time=2026-08-25T10:14:00+00:00`
#[derive(Debug, Clone, PartialEq)]
pub struct BlockHeader {
    /// Monotonically increasing sequence number (1-based, file order)
    pub sequence: u64,
    /// Backend host the batch was registered for, or "custom targets"
    pub backend: String,
    /// Opaque client-supplied machine identifier
    pub machine: String,
    /// UTC timestamp (RFC 3339)
    pub timestamp: String,
}

const HEADER_PREFIX: &str = "# registration ";

impl BlockHeader {
    /// Serialize to the comment-line form written into the Caddyfile
    pub fn render(&self) -> String {
        format!(
            "{}{} backend={} machine={} time={}",
            HEADER_PREFIX, self.sequence, self.backend, self.machine, self.timestamp
        )
    }

    /// Parse a header comment line. Returns `None` for anything that is not
    /// a well-formed header; malformed header-ish comments are treated as
    /// opaque text rather than errors, since operators edit this file.
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.trim().strip_prefix(HEADER_PREFIX)?;
        let mut parts = rest.split_whitespace();
        let sequence: u64 = parts.next()?.parse().ok()?;

        let mut backend = None;
        let mut machine = None;
        let mut timestamp = None;
        for part in parts {
            if let Some(v) = part.strip_prefix("backend=") {
                backend = Some(v.to_string());
            } else if let Some(v) = part.strip_prefix("machine=") {
                machine = Some(v.to_string());
            } else if let Some(v) = part.strip_prefix("time=") {
                timestamp = Some(v.to_string());
            } else if let Some(b) = backend.as_mut() {
                // "custom targets" contains a space; glue trailing words
                // back onto the backend field if no later key has started
                if machine.is_none() && timestamp.is_none() {
                    b.push(' ');
                    b.push_str(part);
                }
            }
        }

        Some(Self {
            sequence,
            backend: backend?,
            machine: machine?,
            timestamp: timestamp?,
        })
    }
}

/// One site block: a fully-qualified host bound to forwarding directives
#[derive(Debug, Clone, PartialEq)]
pub struct SiteBlock {
    /// Fully-qualified domain the block routes
    pub host: String,
    /// Trimmed raw directive lines, nested sub-blocks included as lines
    pub directives: Vec<String>,
}

impl SiteBlock {
    /// The DNS label immediately preceding `base_domain` in `host`, or
    /// `None` if the host is not a subdomain of the base domain.
    ///
    /// For `code.ab12cd34.example.com` under `example.com` this is
    /// `ab12cd34` - the tenant identity the block belongs to.
    pub fn tenant_label(&self, base_domain: &str) -> Option<&str> {
        let prefix = self.host.strip_suffix(base_domain)?.strip_suffix('.')?;
        if prefix.is_empty() {
            return None;
        }
        prefix.rsplit('.').next()
    }

    /// Destination of the first `reverse_proxy` directive in the block,
    /// skipping matcher (`@name`) and path (`/...`) tokens.
    pub fn proxy_target(&self) -> Option<&str> {
        for directive in &self.directives {
            let mut tokens = directive.split_whitespace();
            if tokens.next() != Some("reverse_proxy") {
                continue;
            }
            for token in tokens {
                if token.starts_with('@') || token.starts_with('/') {
                    continue;
                }
                return Some(token);
            }
        }
        None
    }

    /// Host portion (before any `:port`) of the first proxy target
    pub fn target_backend_host(&self) -> Option<&str> {
        let target = self.proxy_target()?;
        Some(target.split(':').next().unwrap_or(target))
    }
}

/// Parsed view of the whole configuration file
#[derive(Debug, Clone, Default)]
pub struct ConfigDocument {
    /// Normalized raw content: LF line endings, exactly one trailing
    /// newline when non-empty. Opaque text segments are preserved verbatim.
    pub text: String,
    /// Recognized site blocks, in file order
    pub sites: Vec<SiteBlock>,
    /// Recognized registration headers, in file order
    pub headers: Vec<BlockHeader>,
}

impl ConfigDocument {
    /// Parse the raw file content. Never fails: unrecognizable lines stay
    /// opaque text, and an unclosed brace swallows the rest of the file
    /// into its block rather than erroring.
    pub fn parse(raw: &str) -> Self {
        let text = normalize(raw);
        let mut sites = Vec::new();
        let mut headers = Vec::new();

        let mut lines = text.lines();
        while let Some(line) = lines.next() {
            if let Some(header) = BlockHeader::parse(line) {
                headers.push(header);
                continue;
            }
            if let Some(host) = site_block_opener(line) {
                let mut depth = 1usize;
                let mut directives = Vec::new();
                for inner in lines.by_ref() {
                    let trimmed = inner.trim();
                    depth += trimmed.matches('{').count();
                    depth = depth.saturating_sub(trimmed.matches('}').count());
                    if depth == 0 {
                        break;
                    }
                    if !trimmed.is_empty() {
                        directives.push(trimmed.to_string());
                    }
                }
                sites.push(SiteBlock {
                    host: host.to_string(),
                    directives,
                });
            }
        }

        Self {
            text,
            sites,
            headers,
        }
    }

    /// All tenant labels present in the document under `base_domain`
    pub fn tenant_labels(&self, base_domain: &str) -> HashSet<&str> {
        self.sites
            .iter()
            .filter_map(|s| s.tenant_label(base_domain))
            .collect()
    }

    /// Whether a site block for `host` already exists
    pub fn has_site(&self, host: &str) -> bool {
        self.sites.iter().any(|s| s.host == host)
    }

    /// One greater than the highest header sequence number seen, or 1
    pub fn next_header_sequence(&self) -> u64 {
        self.headers
            .iter()
            .map(|h| h.sequence)
            .max()
            .map_or(1, |max| max + 1)
    }
}

/// Recognize an unindented `<host> {` line. The host must be a single token
/// containing a dot, so global option blocks (`{`) and snippet definitions
/// (`(name) {`) stay opaque.
fn site_block_opener(line: &str) -> Option<&str> {
    if line.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = line.trim_end().strip_suffix('{')?;
    let host = rest.trim();
    if host.is_empty() || host.contains(char::is_whitespace) {
        return None;
    }
    if !host.contains('.') || host.starts_with('#') || host.starts_with('(') {
        return None;
    }
    Some(host)
}

/// Canonicalize line endings to LF and trailing whitespace to exactly one
/// final newline (empty input stays empty).
pub fn normalize(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n");
    let trimmed = unified.trim_end_matches('\n');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}\n", trimmed)
    }
}
