use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// `VersionRelease` is an RPM-flavored `[epoch:]version[-release]` value.
///
/// - The epoch is the text before the first `:` when that text is a non-empty
///   run of digits. A missing epoch compares as `0`.
/// - The release is the text after the *last* `-`, so versions may carry
///   hyphens of their own. A missing release sorts below any release.
///
/// Each field is compared with [`rpmvercmp`]. Equality follows that ordering,
/// so `1.02-1` and `1.2-1` are equal even though their text differs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct VersionRelease {
    raw: String,
    epoch: Option<String>,
    version: String,
    release: Option<String>,
}

impl VersionRelease {
    /// Parses a `[epoch:]version[-release]` string. Parsing never fails;
    /// irregular input is compared segment by segment as literal text.
    ///
    /// # Examples
    ///
    /// ```
    /// use branch_inventory::vrs::VersionRelease;
    /// let vr = VersionRelease::parse("1:2.0-beta-alt1");
    /// assert_eq!(Some("1"), vr.epoch());
    /// assert_eq!("2.0-beta", vr.version());
    /// assert_eq!(Some("alt1"), vr.release());
    /// ```
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let (epoch, rest) = split_epoch(input);
        let (version, release) = match rest.rsplit_once('-') {
            Some((version, release)) => (version, Some(release)),
            None => (rest, None),
        };
        VersionRelease {
            raw: input.to_string(),
            epoch: epoch.map(ToString::to_string),
            version: version.to_string(),
            release: release.map(ToString::to_string),
        }
    }

    /// Builds a `VersionRelease` from separate package fields. The release is
    /// taken as-is rather than re-split, so a hyphen inside either field
    /// can't move the boundary.
    #[must_use]
    pub fn from_parts(version: &str, release: &str) -> Self {
        let raw = format!("{version}-{release}");
        let (epoch, version) = split_epoch(version);
        VersionRelease {
            raw,
            epoch: epoch.map(ToString::to_string),
            version: version.to_string(),
            release: Some(release.to_string()),
        }
    }

    #[must_use]
    pub fn epoch(&self) -> Option<&str> {
        self.epoch.as_deref()
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn release(&self) -> Option<&str> {
        self.release.as_deref()
    }
}

fn split_epoch(input: &str) -> (Option<&str>, &str) {
    match input.split_once(':') {
        Some((epoch, rest)) if !epoch.is_empty() && epoch.bytes().all(|b| b.is_ascii_digit()) => {
            (Some(epoch), rest)
        }
        _ => (None, input),
    }
}

impl Ord for VersionRelease {
    fn cmp(&self, other: &Self) -> Ordering {
        rpmvercmp(
            self.epoch.as_deref().unwrap_or("0"),
            other.epoch.as_deref().unwrap_or("0"),
        )
        .then_with(|| rpmvercmp(&self.version, &other.version))
        .then_with(|| {
            rpmvercmp(
                self.release.as_deref().unwrap_or_default(),
                other.release.as_deref().unwrap_or_default(),
            )
        })
    }
}

impl PartialOrd for VersionRelease {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for VersionRelease {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionRelease {}

impl From<String> for VersionRelease {
    fn from(value: String) -> Self {
        VersionRelease::parse(&value)
    }
}

impl From<VersionRelease> for String {
    fn from(value: VersionRelease) -> Self {
        value.raw
    }
}

impl fmt::Display for VersionRelease {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Compares two `[epoch:]version[-release]` strings.
#[must_use]
pub fn compare(a: &str, b: &str) -> Ordering {
    VersionRelease::parse(a).cmp(&VersionRelease::parse(b))
}

/// Compares a single version field the way `rpmvercmp` does.
///
/// Both strings are walked as alternating runs of digits and ASCII letters;
/// anything else is a separator. Numeric runs compare as integers with
/// leading zeros ignored, alphabetic runs compare bytewise, and a numeric run
/// beats an alphabetic one. `~` sorts below everything, even the end of the
/// string, and `^` sorts above the end of the string but below any further
/// segment. When one side runs out first, the other side is greater.
#[must_use]
pub fn rpmvercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let mut one = a.as_bytes();
    let mut two = b.as_bytes();

    loop {
        one = skip_separators(one);
        two = skip_separators(two);

        match (one.first(), two.first()) {
            (Some(b'~'), Some(b'~')) => {
                one = &one[1..];
                two = &two[1..];
                continue;
            }
            (Some(b'~'), _) => return Ordering::Less,
            (_, Some(b'~')) => return Ordering::Greater,
            _ => (),
        }

        match (one.first(), two.first()) {
            (Some(b'^'), Some(b'^')) => {
                one = &one[1..];
                two = &two[1..];
                continue;
            }
            (None, Some(b'^')) | (Some(b'^'), Some(_)) => return Ordering::Less,
            (Some(b'^'), None) | (Some(_), Some(b'^')) => return Ordering::Greater,
            _ => (),
        }

        let (Some(&head), false) = (one.first(), two.is_empty()) else {
            break;
        };

        let numeric = head.is_ascii_digit();
        let (seg_one, rest_one) = split_run(one, numeric);
        let (seg_two, rest_two) = split_run(two, numeric);

        if seg_two.is_empty() {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let ordering = if numeric {
            compare_numeric(seg_one, seg_two)
        } else {
            seg_one.cmp(seg_two)
        };
        if ordering != Ordering::Equal {
            return ordering;
        }

        one = rest_one;
        two = rest_two;
    }

    match (one.is_empty(), two.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, _) => Ordering::Greater,
    }
}

fn skip_separators(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| b.is_ascii_alphanumeric() || *b == b'~' || *b == b'^')
        .unwrap_or(bytes.len());
    &bytes[start..]
}

fn split_run(bytes: &[u8], numeric: bool) -> (&[u8], &[u8]) {
    let end = bytes
        .iter()
        .position(|b| {
            if numeric {
                !b.is_ascii_digit()
            } else {
                !b.is_ascii_alphabetic()
            }
        })
        .unwrap_or(bytes.len());
    bytes.split_at(end)
}

fn compare_numeric(a: &[u8], b: &[u8]) -> Ordering {
    let a = skip_leading_zeros(a);
    let b = skip_leading_zeros(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn skip_leading_zeros(digits: &[u8]) -> &[u8] {
    let start = digits
        .iter()
        .position(|b| *b != b'0')
        .unwrap_or(digits.len());
    &digits[start..]
}
