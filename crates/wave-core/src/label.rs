//! Label and fixup bookkeeping.
//!
//! A label is a named position in the code buffer. A fixup is a deferred
//! 32-bit relative displacement recorded at the moment a forward reference
//! is emitted. `resolve` patches every fixup against the first label
//! defined under that name, leaving unresolved fixups as zero displacement.

use crate::buffer::ByteBuffer;
use crate::error::CompileWarning;

#[derive(Debug, Default)]
pub struct LabelTable {
    labels: Vec<(String, u32)>,
    fixups: Vec<(String, u32)>,
}

impl LabelTable {
    pub fn new() -> Self {
        LabelTable::default()
    }

    pub fn add_label(&mut self, name: impl Into<String>, offset: u32) {
        self.labels.push((name.into(), offset));
    }

    pub fn add_fixup(&mut self, name: impl Into<String>, offset: u32) {
        self.fixups.push((name.into(), offset));
    }

    fn find_label(&self, name: &str) -> Option<u32> {
        self.labels.iter().find(|(n, _)| n == name).map(|(_, o)| *o)
    }

    /// Patch every recorded fixup into `code`. Returns one warning per
    /// fixup whose label was never defined.
    pub fn resolve(&self, code: &mut ByteBuffer) -> Vec<CompileWarning> {
        let mut warnings = Vec::new();
        for (label, fixup_offset) in &self.fixups {
            match self.find_label(label) {
                Some(target) => {
                    let disp = target as i64 - (*fixup_offset as i64 + 4);
                    code.patch_i32(*fixup_offset, disp as i32);
                }
                None => warnings.push(CompileWarning::UnresolvedFixup {
                    label: label.clone(),
                }),
            }
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_forward_reference() {
        let mut code = ByteBuffer::new(64);
        let mut labels = LabelTable::new();

        code.put1(0xe9);
        let fixup_at = code.len();
        labels.add_fixup("end", fixup_at);
        code.put4(0);

        code.put1(0x90);
        code.put1(0x90);
        labels.add_label("end", code.len());

        let warnings = labels.resolve(&mut code);
        assert!(warnings.is_empty());

        let disp = i32::from_le_bytes(code.as_slice()[1..5].try_into().unwrap());
        assert_eq!(disp, 2);
    }

    #[test]
    fn unresolved_fixup_stays_zero_and_warns() {
        let mut code = ByteBuffer::new(64);
        let mut labels = LabelTable::new();
        code.put1(0xe9);
        let at = code.len();
        labels.add_fixup("nowhere", at);
        code.put4(0);

        let warnings = labels.resolve(&mut code);
        assert_eq!(warnings.len(), 1);
        assert_eq!(&code.as_slice()[1..5], &[0, 0, 0, 0]);
    }

    #[test]
    fn duplicate_label_uses_first_definition() {
        let mut code = ByteBuffer::new(64);
        let mut labels = LabelTable::new();
        labels.add_label("l", 10);
        labels.add_label("l", 20);
        code.put1(0xe9);
        let at = code.len();
        labels.add_fixup("l", at);
        code.put4(0);
        labels.resolve(&mut code);
        let disp = i32::from_le_bytes(code.as_slice()[1..5].try_into().unwrap());
        assert_eq!(disp, 10 - (1 + 4));
    }
}
