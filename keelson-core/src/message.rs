//! Message parts and peer identities.
//!
//! A [`Msg`] is a single frame of a (possibly multi-part) logical message.
//! The payload is a refcounted `Bytes`, so moving a `Msg` between the
//! decoder, the engine, a pipe and the socket never copies the body.

use bytes::Bytes;
use std::fmt;

/// Flag set carried by every message part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MsgFlags(u8);

impl MsgFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// More parts of the same logical message follow.
    pub const MORE: Self = Self(0x01);
    /// This part carries the peer identity, not payload.
    pub const IDENTITY: Self = Self(0x40);

    #[inline]
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::ops::BitOr for MsgFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// One frame of a logical message.
///
/// Immutable once built: the only mutation is on flags, and only the current
/// owner can perform it.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Msg {
    data: Bytes,
    flags: MsgFlags,
}

impl Msg {
    #[must_use]
    pub const fn new(data: Bytes) -> Self {
        Self {
            data,
            flags: MsgFlags::NONE,
        }
    }

    #[must_use]
    pub const fn with_flags(data: Bytes, flags: MsgFlags) -> Self {
        Self { data, flags }
    }

    /// Zero-length message part.
    #[must_use]
    pub const fn empty() -> Self {
        Self::new(Bytes::new())
    }

    /// Build a part from anything convertible into `Bytes`.
    pub fn from_part(data: impl Into<Bytes>, more: bool) -> Self {
        let flags = if more { MsgFlags::MORE } else { MsgFlags::NONE };
        Self::with_flags(data.into(), flags)
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    #[must_use]
    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    #[inline]
    #[must_use]
    pub const fn flags(&self) -> MsgFlags {
        self.flags
    }

    #[inline]
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.flags.contains(MsgFlags::MORE)
    }

    #[inline]
    #[must_use]
    pub const fn is_identity(&self) -> bool {
        self.flags.contains(MsgFlags::IDENTITY)
    }

    #[inline]
    pub fn set_flags(&mut self, flags: MsgFlags) {
        self.flags = self.flags.union(flags);
    }

    #[inline]
    pub fn reset_flags(&mut self, flags: MsgFlags) {
        self.flags = MsgFlags(self.flags.0 & !flags.0);
    }

    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

impl fmt::Debug for Msg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Msg")
            .field("size", &self.data.len())
            .field("more", &self.has_more())
            .field("identity", &self.is_identity())
            .finish()
    }
}

/// Routing key of a peer.
///
/// Compared and hashed by content. An empty identity means the peer has not
/// been assigned one yet.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Identity(Bytes);

impl Identity {
    #[must_use]
    pub const fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    /// The identity as a message part announcing the source of what follows.
    #[must_use]
    pub fn to_msg(&self) -> Msg {
        Msg::with_flags(self.0.clone(), MsgFlags::MORE)
    }
}

impl From<Bytes> for Identity {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<&'static str> for Identity {
    fn from(s: &'static str) -> Self {
        Self(Bytes::from_static(s.as_bytes()))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.iter().all(|b| b.is_ascii_graphic()) && !self.0.is_empty() {
            write!(f, "Identity({})", String::from_utf8_lossy(&self.0))
        } else {
            write!(f, "Identity(0x")?;
            for b in self.0.iter() {
                write!(f, "{b:02x}")?;
            }
            write!(f, ")")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_roundtrip() {
        let mut msg = Msg::from_part("hello", true);
        assert!(msg.has_more());
        assert!(!msg.is_identity());

        msg.set_flags(MsgFlags::IDENTITY);
        assert!(msg.is_identity());
        assert!(msg.has_more());

        msg.reset_flags(MsgFlags::MORE);
        assert!(!msg.has_more());
        assert!(msg.is_identity());
    }

    #[test]
    fn identity_equality_is_by_content() {
        let a = Identity::from_slice(b"peer");
        let b = Identity::new(Bytes::from(b"peer".to_vec()));
        assert_eq!(a, b);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn identity_msg_has_more() {
        let msg = Identity::from("abc").to_msg();
        assert!(msg.has_more());
        assert_eq!(msg.data().as_ref(), b"abc");
    }

    #[test]
    fn debug_formats_binary_identity_as_hex() {
        let id = Identity::from_slice(&[0, 1, 2, 255]);
        assert_eq!(format!("{id:?}"), "Identity(0x000102ff)");
    }
}
