//! Source-name parsing for `assembly.chr` tokens.
//!
//! MAF row sources are dotted names like `hg38.chr1` or
//! `caeSp111.Scaffold80`. BigMaf and TAF name assemblies without version
//! suffixes, so the first dot always separates assembly from chromosome.
//! MafTabix files in the wild carry versioned assemblies (`ce11.2.chrI`),
//! where the component between the first two dots is a numeric version that
//! belongs to the assembly name.

/// Split on the first `.`: `(assembly, chr)`. A name with no dot has an
/// empty chromosome.
///
/// # Examples
///
/// ```
/// use mafq::names::split_source_name;
///
/// assert_eq!(split_source_name("hg38.chr1"), ("hg38", "chr1"));
/// assert_eq!(split_source_name("mm10.chr1.part"), ("mm10", "chr1.part"));
/// assert_eq!(split_source_name("hg38"), ("hg38", ""));
/// ```
pub fn split_source_name(name: &str) -> (&str, &str) {
    match name.find('.') {
        Some(i) => (&name[..i], &name[i + 1..]),
        None => (name, ""),
    }
}

/// Split a possibly versioned source name: when the component between the
/// first two dots is all decimal digits it is an assembly version suffix
/// and the assembly name keeps it. With zero or one dot this behaves like
/// [`split_source_name`].
///
/// Known misclassification: an unversioned assembly whose chromosome is
/// named with a leading all-digit component (`asm.2.2`) parses as
/// version-suffixed. The heuristic matches the files this reader targets.
///
/// # Examples
///
/// ```
/// use mafq::names::split_source_name_versioned;
///
/// assert_eq!(split_source_name_versioned("ce11.2.chrI"), ("ce11.2", "chrI"));
/// assert_eq!(split_source_name_versioned("hg38.chr1"), ("hg38", "chr1"));
/// assert_eq!(split_source_name_versioned("hg38"), ("hg38", ""));
/// ```
pub fn split_source_name_versioned(name: &str) -> (&str, &str) {
    let first = match name.find('.') {
        Some(i) => i,
        None => return (name, ""),
    };
    let rest = &name[first + 1..];
    match rest.find('.') {
        Some(second) => {
            let middle = &rest[..second];
            if !middle.is_empty() && middle.bytes().all(|b| b.is_ascii_digit()) {
                let split = first + 1 + second;
                (&name[..split], &name[split + 1..])
            } else {
                (&name[..first], rest)
            }
        }
        None => (&name[..first], rest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_split() {
        assert_eq!(split_source_name("hg38.chr1"), ("hg38", "chr1"));
        assert_eq!(split_source_name("mm10.chr1.random"), ("mm10", "chr1.random"));
    }

    #[test]
    fn test_simple_split_no_dot() {
        assert_eq!(split_source_name("scaffold_12"), ("scaffold_12", ""));
    }

    #[test]
    fn test_versioned_split_numeric_middle() {
        assert_eq!(split_source_name_versioned("ce11.2.chrI"), ("ce11.2", "chrI"));
        assert_eq!(
            split_source_name_versioned("caeSp111.1.Scaffold80"),
            ("caeSp111.1", "Scaffold80")
        );
    }

    #[test]
    fn test_versioned_split_non_numeric_middle() {
        assert_eq!(
            split_source_name_versioned("mm10.chr1.random"),
            ("mm10", "chr1.random")
        );
    }

    #[test]
    fn test_versioned_split_degrades_to_simple() {
        assert_eq!(split_source_name_versioned("hg38.chr1"), ("hg38", "chr1"));
        assert_eq!(split_source_name_versioned("hg38"), ("hg38", ""));
    }

    #[test]
    fn test_versioned_split_known_ambiguity() {
        // Numeric chromosome after a numeric version parses as versioned.
        assert_eq!(split_source_name_versioned("asm.2.2"), ("asm.2", "2"));
    }
}
