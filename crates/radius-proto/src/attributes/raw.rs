use super::Attribute;
use crate::packet::PacketError;

/// Borrowed view of one type-length-value entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawAttribute<'a> {
    pub attr_type: u8,
    pub value: &'a [u8],
}

/// Zero-copy walker over a sequence of `[type][length][value]` entries.
///
/// RADIUS attributes, the payload of a Vendor-Specific attribute and most
/// vendor sub-attribute payloads share this layout, so the same walker is
/// used at every nesting level. Input comes straight off the wire: a length
/// byte below 2 or one that runs past the end of the region yields an error,
/// after which the iterator is exhausted.
#[derive(Debug, Clone)]
pub struct RawAttributes<'a> {
    data: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> RawAttributes<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        RawAttributes {
            data,
            offset: 0,
            failed: false,
        }
    }

    /// First entry of the given type, or `Ok(None)` when the region ends
    /// without one. Malformed entries before the match are reported.
    pub fn find(self, attr_type: u8) -> Result<Option<RawAttribute<'a>>, PacketError> {
        for attr in self {
            let attr = attr?;
            if attr.attr_type == attr_type {
                return Ok(Some(attr));
            }
        }
        Ok(None)
    }

    fn fail(&mut self, err: PacketError) -> Option<Result<RawAttribute<'a>, PacketError>> {
        self.failed = true;
        Some(Err(err))
    }
}

impl<'a> Iterator for RawAttributes<'a> {
    type Item = Result<RawAttribute<'a>, PacketError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.data.len() {
            return None;
        }

        let remaining = &self.data[self.offset..];
        if remaining.len() < Attribute::MIN_LENGTH {
            return self.fail(PacketError::Truncated {
                offset: self.offset,
                needed: Attribute::MIN_LENGTH,
                available: remaining.len(),
            });
        }

        let length = remaining[1] as usize;
        if length < Attribute::MIN_LENGTH {
            return self.fail(PacketError::AttributeError(format!(
                "Invalid attribute length {} at offset {}",
                length, self.offset
            )));
        }
        if length > remaining.len() {
            return self.fail(PacketError::Truncated {
                offset: self.offset,
                needed: length,
                available: remaining.len(),
            });
        }

        let attr = RawAttribute {
            attr_type: remaining[0],
            value: &remaining[Attribute::MIN_LENGTH..length],
        };
        self.offset += length;
        Some(Ok(attr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walks_sequence() {
        let data = [1, 4, b'a', b'b', 18, 2, 30, 3, b'x'];
        let attrs: Vec<_> = RawAttributes::new(&data).collect::<Result<_, _>>().unwrap();

        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs[0], RawAttribute { attr_type: 1, value: b"ab" });
        assert_eq!(attrs[1].value, b"");
        assert_eq!(attrs[2].attr_type, 30);
    }

    #[test]
    fn test_empty_region() {
        assert_eq!(RawAttributes::new(&[]).count(), 0);
    }

    #[test]
    fn test_zero_length_is_error_and_stops() {
        let data = [1, 0, 1, 0];
        let mut iter = RawAttributes::new(&data);
        assert!(matches!(iter.next(), Some(Err(PacketError::AttributeError(_)))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_overlong_length_is_truncation() {
        let data = [1, 3, b'a', 26, 200, 0, 0];
        let results: Vec<_> = RawAttributes::new(&data).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert_eq!(
            results[1],
            Err(PacketError::Truncated {
                offset: 3,
                needed: 200,
                available: 4
            })
        );
    }

    #[test]
    fn test_dangling_type_byte() {
        let data = [1, 2, 26];
        let results: Vec<_> = RawAttributes::new(&data).collect();
        assert!(matches!(results[1], Err(PacketError::Truncated { needed: 2, .. })));
    }

    #[test]
    fn test_find() {
        let data = [1, 2, 26, 3, 9];
        let found = RawAttributes::new(&data).find(26).unwrap().unwrap();
        assert_eq!(found.value, [9]);
        assert_eq!(RawAttributes::new(&data).find(33).unwrap(), None);
        assert!(RawAttributes::new(&[1, 9]).find(26).is_err());
    }
}
