//! Property cascade and style normalization.
//!
//! The cascade is an ordered stack of style scopes, one per opened element.
//! Property lookup walks from the most recently pushed scope backward and the
//! first hit wins; an unset property is never an error, the caller supplies
//! its own default. Font-size tokens are normalized to absolute point values
//! before storage so that every later lookup sees a canonical `<n>pt` value.

/// Fixed ladder of point sizes used to resolve relative and keyword sizes.
pub const FONT_SIZE_LADDER: [f32; 7] = [8.0, 10.0, 12.0, 14.0, 18.0, 24.0, 36.0];

/// Default base font size in points when `basefontsize` is unset.
pub const DEFAULT_BASE_FONT_SIZE: f32 = 12.0;

/// One style scope: the properties contributed by a single opened element.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StyleScope {
    /// Element (or class) name this scope was pushed for.
    pub key: String,
    properties: Vec<(String, String)>,
}

impl StyleScope {
    /// Build a scope from already lowercased property pairs.
    pub fn new(key: impl Into<String>, properties: Vec<(String, String)>) -> Self {
        Self {
            key: key.into(),
            properties,
        }
    }

    /// Value of `name` in this scope only.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn set(&mut self, name: &str, value: String) {
        if let Some(slot) = self.properties.iter_mut().find(|(k, _)| k == name) {
            slot.1 = value;
        } else {
            self.properties.push((name.to_string(), value));
        }
    }
}

/// Ordered stack of style scopes with last-push-wins lookup.
#[derive(Clone, Debug, Default)]
pub struct Cascade {
    scopes: Vec<StyleScope>,
}

impl Cascade {
    /// Create an empty cascade.
    pub fn new() -> Self {
        Self {
            scopes: Vec::with_capacity(8),
        }
    }

    /// Number of live scopes.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Push a scope. A `size` property is rewritten to an absolute point
    /// value (resolved against the cascade as it stands) before storage.
    pub fn push(&mut self, mut scope: StyleScope) {
        if let Some(raw) = scope.get("size").map(str::to_string) {
            let pt = normalize_font_size(self, &raw);
            scope.set("size", format!("{pt}pt"));
        }
        self.scopes.push(scope);
    }

    /// Remove the nearest scope (from the end) whose key equals `key`.
    ///
    /// No-op when no scope matches; malformed removal order is tolerated.
    pub fn pop(&mut self, key: &str) {
        if let Some(idx) = self.scopes.iter().rposition(|s| s.key == key) {
            self.scopes.remove(idx);
        }
    }

    /// Resolve a property: linear scan from the end, first hit wins.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Whether any live scope carries `name`.
    pub fn has_property(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Effective font size in points.
    pub fn resolved_size_pt(&self) -> f32 {
        match self.lookup("size") {
            Some(stored) => parse_pt(stored).unwrap_or(DEFAULT_BASE_FONT_SIZE),
            None => self.base_font_size(),
        }
    }

    /// Current `basefontsize`, defaulting to 12 when unset.
    pub fn base_font_size(&self) -> f32 {
        self.lookup("basefontsize")
            .and_then(|raw| raw.trim().parse::<f32>().ok())
            .unwrap_or(DEFAULT_BASE_FONT_SIZE)
    }
}

/// Resolve a raw font-size token to an absolute point value.
///
/// Unit-suffixed tokens parse directly; `+n`/`-n` shift along the size
/// ladder relative to the current `basefontsize`; bare integers are 1-based
/// ladder levels. Any parse failure falls back to the smallest ladder entry
/// rather than erroring.
pub fn normalize_font_size(cascade: &Cascade, token: &str) -> f32 {
    let token = token.trim();
    if let Some(stripped) = token.strip_suffix("pt") {
        if let Ok(pt) = stripped.trim().parse::<f32>() {
            return pt;
        }
        return FONT_SIZE_LADDER[0];
    }
    if token.starts_with('+') || token.starts_with('-') {
        let Ok(delta) = token.trim_start_matches('+').parse::<i32>() else {
            return FONT_SIZE_LADDER[0];
        };
        let base = cascade.base_font_size();
        let idx = ladder_index_at_most(base) as i32 + delta;
        let idx = idx.clamp(0, FONT_SIZE_LADDER.len() as i32 - 1) as usize;
        return FONT_SIZE_LADDER[idx];
    }
    let level = token.parse::<i32>().unwrap_or(1);
    let idx = (level - 1).clamp(0, FONT_SIZE_LADDER.len() as i32 - 1) as usize;
    FONT_SIZE_LADDER[idx]
}

/// Index of the largest ladder entry not exceeding `size`.
fn ladder_index_at_most(size: f32) -> usize {
    let mut idx = 0;
    for (i, entry) in FONT_SIZE_LADDER.iter().enumerate() {
        if *entry <= size {
            idx = i;
        }
    }
    idx
}

/// Parse a canonical `<n>pt` value.
pub(crate) fn parse_pt(raw: &str) -> Option<f32> {
    raw.trim()
        .strip_suffix("pt")
        .unwrap_or(raw.trim())
        .trim()
        .parse::<f32>()
        .ok()
}
