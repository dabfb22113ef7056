//! Internal testing utilities for the protowire crates.
//!
//! This provides a harness for table-driven tests and a small hand-rolled
//! wire-format writer for building decoder inputs. The writer does not use
//! `protowire`'s encoder.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};

/// Utility for creating parametrized (aka. table-driven) tests.
///
/// Create a `Case` struct describing one test case, build an array of them
/// named `cases`, then call `cases.test_each` with the test body. All cases
/// run even if some of them panic; afterwards the harness panics with the
/// debug representation of every failing case.
///
/// ## Example
///
/// ```
/// use protowire_testing::TestCases;
///
/// // Add #[test] attribute
/// fn test_zigzag() {
///   #[derive(Debug)]
///   struct Case {
///     value: i32,
///     expected: u32,
///   }
///
///   let cases = [
///     Case { value: 0, expected: 0 },
///     Case { value: -1, expected: 1 },
///   ];
///
///   cases.test_each(|&Case { value, expected }| {
///     assert_eq!(((value << 1) ^ (value >> 31)) as u32, expected);
///   });
/// }
/// # test_zigzag();
/// ```
///
/// Cases and captured values must be
/// [unwind safe](https://doc.rust-lang.org/std/panic/fn.catch_unwind.html).
/// Where a case holds something that is not, describe how to construct it
/// instead and build it inside the test body.
pub trait TestCases {
    /// The data for a single test case.
    type Case;

    /// Call `test` with a reference to each case, catching panics.
    fn test_each(self, test: impl Fn(&Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe;

    /// Call `test` with each case by value.
    ///
    /// Each case is formatted before the call so that failures can still be
    /// reported after the case has been moved into the test body.
    fn test_each_value(self, test: impl Fn(Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe;
}

impl<I: IntoIterator> TestCases for I {
    type Case = I::Item;

    fn test_each(self, test: impl Fn(&I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe,
    {
        let mut failures = Vec::new();
        for case in self {
            if std::panic::catch_unwind(|| test(&case)).is_err() {
                failures.push(format!("{:?}", case));
            }
        }
        report_failures(failures);
    }

    fn test_each_value(self, test: impl Fn(I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe,
    {
        let mut failures = Vec::new();
        for case in self {
            let test = &test;
            let case_str = format!("{:?}", case);
            if std::panic::catch_unwind(move || test(case)).is_err() {
                failures.push(case_str);
            }
        }
        report_failures(failures);
    }
}

fn report_failures(failures: Vec<String>) {
    assert_eq!(
        failures.len(),
        0,
        "{} test cases failed: {:?}",
        failures.len(),
        failures
    );
}

/// Encode `val` as a base-128 varint.
pub fn varint(mut val: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(10);
    while val > 0x7f {
        bytes.push((val as u8 & 0x7f) | 0x80);
        val >>= 7;
    }
    bytes.push(val as u8);
    bytes
}

/// Builder for raw wire-format messages used as decoder test input.
///
/// ```
/// use protowire_testing::WireBuilder;
///
/// let buf = WireBuilder::new().varint(1, 150).finish();
/// assert_eq!(buf, [0x08, 0x96, 0x01]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct WireBuilder {
    buf: Vec<u8>,
}

impl WireBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn tag(mut self, field: u32, wire_type: u8) -> Self {
        self.buf
            .extend(varint(((field as u64) << 3) | wire_type as u64));
        self
    }

    /// Append a varint field (wire type 0).
    pub fn varint(self, field: u32, val: u64) -> Self {
        let mut this = self.tag(field, 0);
        this.buf.extend(varint(val));
        this
    }

    /// Append a 64-bit field (wire type 1).
    pub fn fixed64(self, field: u32, val: u64) -> Self {
        let mut this = self.tag(field, 1);
        this.buf.extend(val.to_le_bytes());
        this
    }

    /// Append a length-delimited field (wire type 2).
    pub fn bytes(self, field: u32, data: &[u8]) -> Self {
        let mut this = self.tag(field, 2);
        this.buf.extend(varint(data.len() as u64));
        this.buf.extend_from_slice(data);
        this
    }

    /// Append a length-delimited field containing a UTF-8 string.
    pub fn string(self, field: u32, s: &str) -> Self {
        self.bytes(field, s.as_bytes())
    }

    /// Append a field containing an embedded message.
    pub fn message(self, field: u32, msg: WireBuilder) -> Self {
        self.bytes(field, &msg.buf)
    }

    /// Append a 32-bit field (wire type 5).
    pub fn fixed32(self, field: u32, val: u32) -> Self {
        let mut this = self.tag(field, 5);
        this.buf.extend(val.to_le_bytes());
        this
    }

    /// Append a tag with an arbitrary wire type and no payload.
    pub fn raw_tag(self, field: u32, wire_type: u8) -> Self {
        self.tag(field, wire_type)
    }

    /// Append raw bytes verbatim.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Parse a string of whitespace-separated hex byte pairs, eg. `"08 96 01"`.
///
/// Panics if the string is malformed.
pub fn hex(s: &str) -> Vec<u8> {
    s.split_whitespace()
        .map(|b| u8::from_str_radix(b, 16).unwrap_or_else(|_| panic!("bad hex byte {b:?}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{hex, varint, TestCases, WireBuilder};

    #[test]
    fn test_test_each_success() {
        #[derive(Debug)]
        struct Case {
            x: i32,
        }

        let cases = [Case { x: 1 }, Case { x: 2 }];
        cases.test_each(|case| assert!(case.x > 0));
    }

    #[test]
    #[should_panic(expected = "2 test cases failed")]
    fn test_test_each_failure() {
        #[derive(Debug)]
        struct Case {
            x: i32,
        }

        let cases = [Case { x: 1 }, Case { x: 2 }];
        cases.test_each(|case| {
            _ = case.x;
            panic!("oh no");
        })
    }

    #[test]
    #[should_panic(expected = "1 test cases failed")]
    fn test_test_each_value_failure() {
        #[derive(Debug)]
        struct Case {
            x: i32,
        }

        let cases = [Case { x: 1 }, Case { x: 2 }];
        cases.test_each_value(|case| assert_eq!(case.x, 1))
    }

    #[test]
    fn test_varint() {
        assert_eq!(varint(0), [0]);
        assert_eq!(varint(150), [0x96, 0x01]);
        assert_eq!(varint(u64::MAX).len(), 10);
    }

    #[test]
    fn test_wire_builder() {
        let buf = WireBuilder::new()
            .varint(1, 150)
            .string(2, "hi")
            .fixed32(3, 1)
            .finish();
        assert_eq!(buf, hex("08 96 01 12 02 68 69 1d 01 00 00 00"));
    }
}
