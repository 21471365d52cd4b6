use avida_derive::BinaryCodec;

pub const NUM_HEADS: usize = 4;

/// Head slots of an execution thread, also the values of head modifiers.
#[repr(usize)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeadKind {
    Ip = 0,
    Read = 1,
    Write = 2,
    Flow = 3,
}

impl HeadKind {
    pub const ALL: [HeadKind; NUM_HEADS] = [HeadKind::Ip, HeadKind::Read, HeadKind::Write, HeadKind::Flow];

    pub fn from_index(index: usize) -> HeadKind {
        HeadKind::ALL[index % NUM_HEADS]
    }
}

/// Position into CPU memory that wraps at the end and clamps below zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, BinaryCodec)]
pub struct Head {
    position: usize,
}

impl Head {
    pub fn new(position: usize) -> Self {
        Self { position }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Brings the head back inside `[0, len)`: past the end wraps, empty
    /// memory pins it to 0.
    #[inline]
    pub fn adjust(&mut self, len: usize) {
        if len == 0 {
            self.position = 0;
        } else if self.position >= len {
            self.position %= len;
        }
    }

    pub fn set(&mut self, position: usize, len: usize) {
        self.position = position;
        self.adjust(len);
    }

    /// Sets from a signed value; negative positions clamp to 0.
    pub fn set_signed(&mut self, position: i64, len: usize) {
        self.position = position.max(0) as usize;
        self.adjust(len);
    }

    #[inline]
    pub fn advance(&mut self, len: usize) {
        self.position += 1;
        self.adjust(len);
    }

    /// Steps back one site; a head at 0 stays there.
    pub fn retreat(&mut self, len: usize) {
        self.position = self.position.saturating_sub(1);
        self.adjust(len);
    }

    pub fn jump(&mut self, offset: i64, len: usize) {
        self.set_signed(self.position as i64 + offset, len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_wraps() {
        let mut head = Head::new(4);
        head.advance(5);
        assert_eq!(head.position(), 0);
    }

    #[test]
    fn adjust_rules() {
        let mut head = Head::new(12);
        head.adjust(5);
        assert_eq!(head.position(), 2);
        head.adjust(0);
        assert_eq!(head.position(), 0);
    }

    #[test]
    fn negative_jumps_clamp() {
        let mut head = Head::new(2);
        head.jump(-5, 10);
        assert_eq!(head.position(), 0);
        head.jump(13, 10);
        assert_eq!(head.position(), 3);
        head.retreat(10);
        assert_eq!(head.position(), 2);
        head.set(0, 10);
        head.retreat(10);
        assert_eq!(head.position(), 0);
    }

    #[test]
    fn head_kind_wraps_index() {
        assert_eq!(HeadKind::from_index(2), HeadKind::Write);
        assert_eq!(HeadKind::from_index(5), HeadKind::Read);
    }
}
