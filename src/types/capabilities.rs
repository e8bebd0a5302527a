use std::collections::HashMap;

/// The set of capabilities a server advertises during the session handshake.
///
/// Each capability is a case-normalized name with an ordered list of string
/// arguments (for example `SIZE 1048576`, or `AUTH PLAIN LOGIN`). A name that
/// begins with `AUTH=` indicates support for that particular authentication
/// mechanism; servers differ on whether they advertise mechanisms that way or
/// as arguments of a single `AUTH` capability, so the negotiation summary
/// accepts both spellings.
///
/// The set is built once per handshake from the raw multi-line greeting
/// response and is read-only thereafter; a re-handshake (for example after
/// `STARTTLS`) replaces it wholesale.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CapabilitySet {
    caps: HashMap<String, Vec<String>>,
}

impl CapabilitySet {
    /// An empty capability set.
    pub fn new() -> CapabilitySet {
        CapabilitySet::default()
    }

    /// Build a capability set from a greeting response.
    ///
    /// `code` is the numeric status of the greeting and `lines` its response
    /// lines; the first line is the server identity and every following line
    /// advertises one capability. Fails softly: a non-2xx status or a
    /// response without informational lines yields an empty set, never an
    /// error.
    pub fn from_response(code: u16, lines: &[String]) -> CapabilitySet {
        let mut set = CapabilitySet::new();
        if !(200..300).contains(&code) || lines.len() < 2 {
            return set;
        }
        for line in &lines[1..] {
            set.add(line, false);
        }
        set
    }

    /// Add one capability line to the set.
    ///
    /// The first whitespace-separated token is uppercased and used as the
    /// name, the remaining tokens become its arguments. By default arguments
    /// merge with any previously recorded ones, skipping duplicates; with
    /// `replace` the previous argument list is discarded.
    pub fn add(&mut self, line: &str, replace: bool) {
        let mut tokens = line.split_whitespace();
        let name = match tokens.next() {
            Some(t) => t.to_uppercase(),
            None => return,
        };
        let args: Vec<String> = tokens.map(String::from).collect();
        if replace {
            self.caps.insert(name, args);
        } else {
            let known = self.caps.entry(name).or_default();
            for arg in args {
                if !known.contains(&arg) {
                    known.push(arg);
                }
            }
        }
    }

    /// Build a capability set from an IMAP-style untagged `CAPABILITY` line,
    /// where every whitespace-separated token advertises one capability
    /// without arguments.
    pub fn from_capability_line(line: &str) -> CapabilitySet {
        let mut set = CapabilitySet::new();
        for token in line.split_whitespace() {
            set.add(token, false);
        }
        set
    }

    /// Check if the server has the given capability. Lookup is
    /// case-insensitive.
    pub fn has(&self, name: &str) -> bool {
        self.caps.contains_key(&name.to_uppercase())
    }

    /// The arguments recorded for the given capability, if it is present.
    pub fn args(&self, name: &str) -> Option<&[String]> {
        self.caps.get(&name.to_uppercase()).map(|v| &v[..])
    }

    /// Returns how many capabilities the server has.
    pub fn len(&self) -> usize {
        self.caps.len()
    }

    /// Returns true if the server purports to have no capabilities.
    pub fn is_empty(&self) -> bool {
        self.caps.is_empty()
    }

    /// The authentication mechanism names the server advertises, collected
    /// from the arguments of an `AUTH` capability and from `AUTH=`-prefixed
    /// capability names, deduplicated and sorted.
    pub fn auth_mechanisms(&self) -> Vec<String> {
        let mut mechs: Vec<String> = Vec::new();
        if let Some(args) = self.caps.get("AUTH") {
            for mech in args {
                let mech = mech.to_uppercase();
                if !mechs.contains(&mech) {
                    mechs.push(mech);
                }
            }
        }
        for name in self.caps.keys() {
            if let Some(mech) = name.strip_prefix("AUTH=") {
                let mech = mech.to_uppercase();
                if !mechs.contains(&mech) {
                    mechs.push(mech);
                }
            }
        }
        mechs.sort();
        mechs
    }

    /// Compose the space-joined summary string the session layer uses to
    /// decide dialect behavior.
    ///
    /// Tokens appear in a fixed order: `STARTTLS` when the caller requests
    /// it, the sorted authentication mechanism names, `PIPELINING` and
    /// `8BITMIME` when advertised, and finally a `SIZE` token. An advertised
    /// size of zero means "unbounded but indeterminate" and renders as
    /// `SIZE=*`; a positive value renders as `SIZE=<n>`; a missing or
    /// unparseable value falls back to the bare token.
    pub fn negotiation_summary(&self, tls_available: bool) -> String {
        let mut tokens: Vec<String> = Vec::new();
        if tls_available {
            tokens.push("STARTTLS".into());
        }
        tokens.extend(self.auth_mechanisms());
        if self.has("PIPELINING") {
            tokens.push("PIPELINING".into());
        }
        if self.has("8BITMIME") {
            tokens.push("8BITMIME".into());
        }
        if let Some(args) = self.args("SIZE") {
            match args.first().and_then(|a| a.parse::<u64>().ok()) {
                Some(0) => tokens.push("SIZE=*".into()),
                Some(n) => tokens.push(format!("SIZE={}", n)),
                None => tokens.push("SIZE".into()),
            }
        }
        tokens.join(" ")
    }
}
