use super::value::Value;

/// Boxed values are signalling NaNs with this tag in the top 16 bits, so they
/// never collide with the quiet NaNs produced by arithmetic.
const TAG: u64 = 0x7FF4_0000_0000_0000;
const TAG_MASK: u64 = 0xFFFF_0000_0000_0000;
const PAYLOAD_MASK: u64 = !TAG_MASK;

/// Slot reserved for `nil`.
const NULL_SLOT: usize = 0;

#[inline(always)]
pub(crate) fn is_boxed(proxy: f64) -> bool {
    proxy.to_bits() & TAG_MASK == TAG
}

/// Equality of two proxies. Boxed values are equal when they share a slot;
/// plain numbers compare numerically.
pub(crate) fn proxy_eq(lhs: f64, rhs: f64) -> bool {
    if is_boxed(lhs) || is_boxed(rhs) {
        lhs.to_bits() == rhs.to_bits()
    } else {
        lhs == rhs
    }
}

/// The values boxed while binding or evaluating an expression.
///
/// Values boxed before [`ValueTable::freeze`] survive [`ValueTable::reset`], so
/// literals folded into the expression stay valid across evaluations.
#[derive(Debug)]
pub(crate) struct ValueTable {
    values: Vec<Value>,
    frozen: usize,
}

impl Default for ValueTable {
    fn default() -> Self {
        Self {
            values: vec![Value::Null],
            frozen: 1,
        }
    }
}

impl ValueTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the proxy for `value`. Numbers are their own proxy; equal values
    /// share a slot.
    pub(crate) fn box_value(&mut self, value: Value) -> f64 {
        match value {
            Value::Number(n) => n,
            Value::Null => encode(NULL_SLOT),
            value => match self.values.iter().position(|existing| existing == &value) {
                Some(slot) => encode(slot),
                None => {
                    self.values.push(value);
                    encode(self.values.len() - 1)
                }
            },
        }
    }

    /// A proxy whose slot is out of range (e.g. left over from an earlier
    /// evaluation) is treated as a number.
    pub(crate) fn unbox(&self, proxy: f64) -> Value {
        if !is_boxed(proxy) {
            return Value::Number(proxy);
        }

        let payload = (proxy.to_bits() & PAYLOAD_MASK) as usize;
        payload
            .checked_sub(1)
            .and_then(|slot| self.values.get(slot))
            .cloned()
            .unwrap_or(Value::Number(proxy))
    }

    pub(crate) fn freeze(&mut self) {
        self.frozen = self.values.len();
    }

    /// Drops every value boxed since the table was frozen.
    pub(crate) fn reset(&mut self) {
        self.values.truncate(self.frozen);
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }
}

#[inline(always)]
fn encode(slot: usize) -> f64 {
    f64::from_bits(TAG | (slot as u64 + 1))
}
