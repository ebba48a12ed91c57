use nalgebra::Point3;

/// One matching sphere: its id, centre and the raw line it was read from.
///
/// The raw line carries the trailing radius, atom and color fields that this
/// crate never interprets; it is written back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct SphereRecord {
    pub id: i64,
    pub position: Point3<f64>,
    pub extra_fields: Vec<String>,
    pub raw: String,
}

/// A matching-sphere file: ordered header lines followed by sphere records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SphereSet {
    headers: Vec<String>,
    records: Vec<SphereRecord>,
}

impl SphereSet {
    pub fn new(headers: Vec<String>, records: Vec<SphereRecord>) -> Self {
        Self { headers, records }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// All header lines except the last one.
    pub fn header_prefix(&self) -> &[String] {
        match self.headers.split_last() {
            Some((_, prefix)) => prefix,
            None => &[],
        }
    }

    /// The cluster header, whose trailing token is the sphere count.
    pub fn last_header(&self) -> Option<&str> {
        self.headers.last().map(String::as_str)
    }

    pub fn records(&self) -> &[SphereRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = &Point3<f64>> + '_ {
        self.records.iter().map(|r| &r.position)
    }
}

/// Rewrites a cluster header line for a block of `count` spheres.
///
/// The trailing whitespace-separated token is replaced by `count`. When
/// `cluster_index` is given, the first standalone `1` token before the count is
/// replaced by `cluster_index + 1` so that repeated headers in a merged file stay
/// distinguishable. Column alignment of the remaining text is preserved.
pub fn rewrite_cluster_header(line: &str, count: usize, cluster_index: Option<usize>) -> String {
    let trimmed = line.trim_end();
    let head = match trimmed.rfind(char::is_whitespace) {
        Some(pos) => &trimmed[..=pos],
        None => "",
    };

    let head = match cluster_index {
        Some(idx) => replace_first_token(head, "1", &(idx + 1).to_string()),
        None => head.to_string(),
    };

    format!("{head}{count}")
}

fn replace_first_token(text: &str, token: &str, replacement: &str) -> String {
    let mut offset = 0;
    for part in text.split_inclusive(char::is_whitespace) {
        let word = part.trim_end();
        if word == token {
            let mut out = String::with_capacity(text.len() + replacement.len());
            out.push_str(&text[..offset]);
            out.push_str(replacement);
            out.push_str(&text[offset + word.len()..]);
            return out;
        }
        offset += part.len();
    }
    text.to_string()
}
