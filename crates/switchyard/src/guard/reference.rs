//! Factory reference grammar.
//!
//! A reference is `module.path:symbol`. Every segment is an ASCII identifier. Anything else is
//! rejected before a lookup is attempted: path separators, percent-encoding, whitespace,
//! non-ASCII look-alikes, empty segments (`..`), attribute access in the symbol, and more than
//! one `:`.

use crate::error::SecurityError;

/// Upper bound on reference length.
pub const MAX_REFERENCE_LEN: usize = 256;

/// A parsed, grammar-checked factory reference borrowed from its source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactoryRef<'a> {
	raw: &'a str,
	module: &'a str,
	symbol: &'a str,
}

impl<'a> FactoryRef<'a> {
	pub fn parse(raw: &'a str) -> Result<Self, SecurityError> {
		let malformed = |reason| SecurityError::Malformed {
			reference: raw.to_owned(),
			reason,
		};

		if raw.is_empty() {
			return Err(malformed("empty reference"));
		}
		if raw.len() > MAX_REFERENCE_LEN {
			return Err(malformed("reference too long"));
		}
		if !raw.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b':')) {
			return Err(malformed("illegal character"));
		}

		let mut parts = raw.split(':');
		let (Some(module), Some(symbol), None) = (parts.next(), parts.next(), parts.next()) else {
			return Err(malformed("expected exactly one ':' separator"));
		};
		if symbol.contains('.') {
			return Err(malformed("attribute access in symbol"));
		}

		check_module_path(module).map_err(malformed)?;
		check_segment(symbol).map_err(malformed)?;

		if let Some(segment) = module.split('.').chain(std::iter::once(symbol)).find(|s| s.starts_with('_')) {
			return Err(SecurityError::PrivateSymbol {
				reference: raw.to_owned(),
				segment: segment.to_owned(),
			});
		}

		Ok(Self { raw, module, symbol })
	}

	pub fn as_str(&self) -> &'a str {
		self.raw
	}

	pub fn module(&self) -> &'a str {
		self.module
	}

	pub fn symbol(&self) -> &'a str {
		self.symbol
	}

	/// True if `module` equals `prefix` or sits below it on a segment boundary.
	pub fn module_within(&self, prefix: &str) -> bool {
		match self.module.strip_prefix(prefix) {
			Some("") => true,
			Some(rest) => rest.starts_with('.'),
			None => false,
		}
	}
}

impl std::fmt::Display for FactoryRef<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.raw)
	}
}

/// Validates a dotted module path. Used for references and for allow-list entries.
pub(crate) fn check_module_path(module: &str) -> Result<(), &'static str> {
	if module.is_empty() {
		return Err("empty module path");
	}
	module.split('.').try_for_each(check_segment)
}

fn check_segment(segment: &str) -> Result<(), &'static str> {
	let Some(first) = segment.bytes().next() else {
		return Err("empty path segment");
	};
	if !(first.is_ascii_alphabetic() || first == b'_') {
		return Err("segment must start with a letter");
	}
	if !segment.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
		return Err("illegal character");
	}
	Ok(())
}
