// 1.0: fixed-point numeric base. every amount carries its decimal precision in its type,
// so adding a price to a quote amount does not compile. products are Wide<P, Q> and have
// to be rescaled on purpose before they can be combined with anything else.
// 1.1 is the generic Scaled<P>, 1.2 the product type, 1.3 runtime-tagged token amounts.

use crate::error::{InvariantViolation, MathResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

pub trait Precision:
    Copy + Default + fmt::Debug + Eq + Ord + Hash + Send + Sync + 'static
{
    const DECIMALS: u32;
    const NAME: &'static str;
    const SCALE: i128 = pow10(Self::DECIMALS);
}

pub const fn pow10(exp: u32) -> i128 {
    10_i128.pow(exp)
}

macro_rules! precision {
    ($(#[$meta:meta])* $name:ident, $decimals:expr, $label:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name;

        impl Precision for $name {
            const DECIMALS: u32 = $decimals;
            const NAME: &'static str = $label;
        }
    };
}

precision!(
    /// Oracle, mark, bid and ask prices.
    PricePrecision, 6, "PRICE"
);
precision!(
    /// Quote asset amounts: pnl, cost basis, notional.
    QuotePrecision, 6, "QUOTE"
);
precision!(
    /// Base asset amounts and the AMM base reserve.
    BasePrecision, 9, "BASE"
);
precision!(
    /// AMM quote reserve. Converted to quote through the peg.
    QuoteReservePrecision, 9, "QUOTE_RESERVE"
);
precision!(PegPrecision, 6, "PEG");
precision!(
    /// Margin ratios. 10_000 = 100%.
    MarginPrecision, 4, "MARGIN"
);
precision!(
    /// Asset and liability weights. 10_000 = 100%.
    WeightPrecision, 4, "WEIGHT"
);
precision!(ImfPrecision, 6, "IMF");
precision!(
    /// Bid/ask spread fractions. 1_000_000 = 100%.
    SpreadPrecision, 6, "SPREAD"
);
precision!(LiquidationFeePrecision, 6, "LIQUIDATION_FEE");
precision!(
    /// Stored spot balances, before the interest index is applied.
    BalancePrecision, 9, "BALANCE"
);
precision!(InterestPrecision, 10, "INTEREST");
precision!(PercentagePrecision, 6, "PERCENTAGE");

pub type Price = Scaled<PricePrecision>;
pub type QuoteAmount = Scaled<QuotePrecision>;
pub type BaseAmount = Scaled<BasePrecision>;
pub type QuoteReserve = Scaled<QuoteReservePrecision>;
pub type Peg = Scaled<PegPrecision>;
pub type MarginRatio = Scaled<MarginPrecision>;
pub type Weight = Scaled<WeightPrecision>;
pub type ImfFactor = Scaled<ImfPrecision>;
pub type Spread = Scaled<SpreadPrecision>;
pub type LiquidationFee = Scaled<LiquidationFeePrecision>;
pub type Balance = Scaled<BalancePrecision>;
pub type InterestIndex = Scaled<InterestPrecision>;
pub type Percentage = Scaled<PercentagePrecision>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Toward zero.
    Truncate,
    /// Toward positive infinity.
    Ceil,
}

pub(crate) fn div_round(
    numerator: i128,
    denominator: i128,
    rounding: Rounding,
    op: &'static str,
) -> MathResult<i128> {
    if denominator == 0 {
        return Err(InvariantViolation::DivisionByZero(op));
    }
    let quotient = numerator
        .checked_div(denominator)
        .ok_or(InvariantViolation::Overflow(op))?;
    match rounding {
        Rounding::Truncate => Ok(quotient),
        Rounding::Ceil => {
            let remainder = numerator % denominator;
            if remainder != 0 && ((remainder > 0) == (denominator > 0)) {
                quotient.checked_add(1).ok_or(InvariantViolation::Overflow(op))
            } else {
                Ok(quotient)
            }
        }
    }
}

fn checked_pow10(exp: u32, op: &'static str) -> MathResult<i128> {
    10_i128
        .checked_pow(exp)
        .ok_or(InvariantViolation::Overflow(op))
}

// moves `raw` from `from` decimals to `to` decimals
fn shift_decimals(
    raw: i128,
    from: u32,
    to: u32,
    rounding: Rounding,
    op: &'static str,
) -> MathResult<i128> {
    if to >= from {
        raw.checked_mul(checked_pow10(to - from, op)?)
            .ok_or(InvariantViolation::Overflow(op))
    } else {
        div_round(raw, checked_pow10(from - to, op)?, rounding, op)
    }
}

// numerator / denominator with the result landing `shift` decimals above the natural
// precision of the quotient. scales the numerator up, or the denominator up when
// shift is negative, so nothing is lost to an early division.
fn div_with_shift(
    numerator: i128,
    denominator: i128,
    shift: i64,
    rounding: Rounding,
    op: &'static str,
) -> MathResult<i128> {
    if shift >= 0 {
        let numerator = numerator
            .checked_mul(checked_pow10(shift as u32, op)?)
            .ok_or(InvariantViolation::Overflow(op))?;
        div_round(numerator, denominator, rounding, op)
    } else {
        let denominator = denominator
            .checked_mul(checked_pow10((-shift) as u32, op)?)
            .ok_or(InvariantViolation::Overflow(op))?;
        div_round(numerator, denominator, rounding, op)
    }
}

/// Floor integer square root.
pub fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let shift = (128 - n.leading_zeros() + 1) / 2;
    let mut x = 1_u128 << shift;
    loop {
        let y = (x + n / x) / 2;
        if y >= x {
            return x;
        }
        x = y;
    }
}

// 1.1: a signed integer at a precision known to the compiler.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent, bound = "")]
pub struct Scaled<P: Precision> {
    raw: i128,
    #[serde(skip)]
    _precision: PhantomData<P>,
}

impl<P: Precision> Scaled<P> {
    pub const ZERO: Self = Self::from_raw(0);

    pub const fn from_raw(raw: i128) -> Self {
        Self {
            raw,
            _precision: PhantomData,
        }
    }

    /// One whole unit, i.e. `10^DECIMALS` raw.
    pub fn one() -> Self {
        Self::from_raw(P::SCALE)
    }

    /// `units` whole units.
    pub fn from_units(units: i128) -> MathResult<Self> {
        units
            .checked_mul(P::SCALE)
            .map(Self::from_raw)
            .ok_or(InvariantViolation::Overflow("from_units"))
    }

    pub const fn raw(self) -> i128 {
        self.raw
    }

    pub fn is_zero(self) -> bool {
        self.raw == 0
    }

    pub fn is_positive(self) -> bool {
        self.raw > 0
    }

    pub fn is_negative(self) -> bool {
        self.raw < 0
    }

    pub fn signum(self) -> i128 {
        self.raw.signum()
    }

    pub fn abs(self) -> MathResult<Self> {
        self.raw
            .checked_abs()
            .map(Self::from_raw)
            .ok_or(InvariantViolation::Overflow("abs"))
    }

    pub fn checked_add(self, rhs: Self) -> MathResult<Self> {
        self.raw
            .checked_add(rhs.raw)
            .map(Self::from_raw)
            .ok_or(InvariantViolation::Overflow("add"))
    }

    pub fn checked_sub(self, rhs: Self) -> MathResult<Self> {
        self.raw
            .checked_sub(rhs.raw)
            .map(Self::from_raw)
            .ok_or(InvariantViolation::Overflow("sub"))
    }

    pub fn checked_neg(self) -> MathResult<Self> {
        self.raw
            .checked_neg()
            .map(Self::from_raw)
            .ok_or(InvariantViolation::Overflow("neg"))
    }

    /// Multiply by a dimensionless integer.
    pub fn mul_int(self, n: i128) -> MathResult<Self> {
        self.raw
            .checked_mul(n)
            .map(Self::from_raw)
            .ok_or(InvariantViolation::Overflow("mul_int"))
    }

    /// Divide by a dimensionless integer, truncating toward zero.
    pub fn div_int(self, n: i128) -> MathResult<Self> {
        div_round(self.raw, n, Rounding::Truncate, "div_int").map(Self::from_raw)
    }

    pub fn div_int_ceil(self, n: i128) -> MathResult<Self> {
        div_round(self.raw, n, Rounding::Ceil, "div_int_ceil").map(Self::from_raw)
    }

    /// Full-width product. The result keeps both precisions until it is rescaled.
    pub fn checked_mul<Q: Precision>(self, rhs: Scaled<Q>) -> MathResult<Wide<P, Q>> {
        self.raw
            .checked_mul(rhs.raw)
            .map(Wide::from_raw)
            .ok_or(InvariantViolation::Overflow("mul"))
    }

    /// `self * rhs / denominator`, landing in precision `R`. Truncates toward zero.
    pub fn mul_div<Q: Precision, D: Precision, R: Precision>(
        self,
        rhs: Scaled<Q>,
        denominator: Scaled<D>,
    ) -> MathResult<Scaled<R>> {
        self.checked_mul(rhs)?.div_to(denominator)
    }

    /// `self * rhs / denominator`, rounded toward positive infinity.
    pub fn mul_div_ceil<Q: Precision, D: Precision, R: Precision>(
        self,
        rhs: Scaled<Q>,
        denominator: Scaled<D>,
    ) -> MathResult<Scaled<R>> {
        self.checked_mul(rhs)?.div_to_ceil(denominator)
    }

    /// `self / denominator` expressed in precision `R`. Truncates toward zero.
    pub fn div_to<D: Precision, R: Precision>(self, denominator: Scaled<D>) -> MathResult<Scaled<R>> {
        let shift = R::DECIMALS as i64 + D::DECIMALS as i64 - P::DECIMALS as i64;
        div_with_shift(self.raw, denominator.raw, shift, Rounding::Truncate, "div_to")
            .map(Scaled::from_raw)
    }

    pub fn div_to_ceil<D: Precision, R: Precision>(
        self,
        denominator: Scaled<D>,
    ) -> MathResult<Scaled<R>> {
        let shift = R::DECIMALS as i64 + D::DECIMALS as i64 - P::DECIMALS as i64;
        div_with_shift(self.raw, denominator.raw, shift, Rounding::Ceil, "div_to_ceil")
            .map(Scaled::from_raw)
    }

    /// Same quantity at another precision. Truncates toward zero when narrowing.
    pub fn rescale<R: Precision>(self) -> MathResult<Scaled<R>> {
        shift_decimals(self.raw, P::DECIMALS, R::DECIMALS, Rounding::Truncate, "rescale")
            .map(Scaled::from_raw)
    }

    pub fn rescale_ceil<R: Precision>(self) -> MathResult<Scaled<R>> {
        shift_decimals(self.raw, P::DECIMALS, R::DECIMALS, Rounding::Ceil, "rescale_ceil")
            .map(Scaled::from_raw)
    }

    /// Display value. Never feed this back into ledger math.
    pub fn to_decimal(self) -> Decimal {
        Decimal::try_from_i128_with_scale(self.raw, P::DECIMALS).unwrap_or(if self.raw < 0 {
            Decimal::MIN
        } else {
            Decimal::MAX
        })
    }
}

impl<P: Precision> fmt::Debug for Scaled<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", P::NAME, self.raw)
    }
}

impl<P: Precision> fmt::Display for Scaled<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

// 1.2: product of two scaled values, carrying DECIMALS_P + DECIMALS_Q decimals.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Wide<P: Precision, Q: Precision> {
    raw: i128,
    _precision: PhantomData<(P, Q)>,
}

impl<P: Precision, Q: Precision> Wide<P, Q> {
    pub const DECIMALS: u32 = P::DECIMALS + Q::DECIMALS;

    pub const fn from_raw(raw: i128) -> Self {
        Self {
            raw,
            _precision: PhantomData,
        }
    }

    pub const fn raw(self) -> i128 {
        self.raw
    }

    pub fn rescale<R: Precision>(self) -> MathResult<Scaled<R>> {
        shift_decimals(self.raw, Self::DECIMALS, R::DECIMALS, Rounding::Truncate, "rescale")
            .map(Scaled::from_raw)
    }

    pub fn rescale_ceil<R: Precision>(self) -> MathResult<Scaled<R>> {
        shift_decimals(self.raw, Self::DECIMALS, R::DECIMALS, Rounding::Ceil, "rescale_ceil")
            .map(Scaled::from_raw)
    }

    pub fn div_to<D: Precision, R: Precision>(self, denominator: Scaled<D>) -> MathResult<Scaled<R>> {
        let shift = R::DECIMALS as i64 + D::DECIMALS as i64 - Self::DECIMALS as i64;
        div_with_shift(self.raw, denominator.raw(), shift, Rounding::Truncate, "div_to")
            .map(Scaled::from_raw)
    }

    pub fn div_to_ceil<D: Precision, R: Precision>(
        self,
        denominator: Scaled<D>,
    ) -> MathResult<Scaled<R>> {
        let shift = R::DECIMALS as i64 + D::DECIMALS as i64 - Self::DECIMALS as i64;
        div_with_shift(self.raw, denominator.raw(), shift, Rounding::Ceil, "div_to_ceil")
            .map(Scaled::from_raw)
    }

    /// Floor square root of a non-negative product of two equal precisions,
    /// returned at that precision.
    pub fn sqrt(self) -> MathResult<Scaled<P>> {
        if P::DECIMALS != Q::DECIMALS {
            return Err(InvariantViolation::PrecisionMismatch {
                expected: P::DECIMALS,
                found: Q::DECIMALS,
            });
        }
        if self.raw < 0 {
            return Err(InvariantViolation::NegativeBalance("sqrt"));
        }
        Ok(Scaled::from_raw(isqrt(self.raw as u128) as i128))
    }
}

impl<P: Precision, Q: Precision> fmt::Debug for Wide<P, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}({})", P::NAME, Q::NAME, self.raw)
    }
}

// 1.3: spot token amounts. precision is the mint's decimals, only known at runtime,
// so it travels as a tag and every combination is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenAmount {
    pub amount: i128,
    pub decimals: u32,
}

impl TokenAmount {
    pub fn new(amount: i128, decimals: u32) -> Self {
        Self { amount, decimals }
    }

    pub fn zero(decimals: u32) -> Self {
        Self::new(0, decimals)
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    fn check(&self, other: &TokenAmount) -> MathResult<()> {
        if self.decimals != other.decimals {
            return Err(InvariantViolation::PrecisionMismatch {
                expected: self.decimals,
                found: other.decimals,
            });
        }
        Ok(())
    }

    pub fn checked_add(self, rhs: TokenAmount) -> MathResult<Self> {
        self.check(&rhs)?;
        self.amount
            .checked_add(rhs.amount)
            .map(|amount| Self::new(amount, self.decimals))
            .ok_or(InvariantViolation::Overflow("token add"))
    }

    pub fn checked_sub(self, rhs: TokenAmount) -> MathResult<Self> {
        self.check(&rhs)?;
        self.amount
            .checked_sub(rhs.amount)
            .map(|amount| Self::new(amount, self.decimals))
            .ok_or(InvariantViolation::Overflow("token sub"))
    }

    pub fn min(self, rhs: TokenAmount) -> MathResult<Self> {
        self.check(&rhs)?;
        Ok(if rhs.amount < self.amount { rhs } else { self })
    }

    /// Reinterpret as a typed amount. The decimals must match exactly.
    pub fn to_scaled<P: Precision>(self) -> MathResult<Scaled<P>> {
        if self.decimals != P::DECIMALS {
            return Err(InvariantViolation::PrecisionMismatch {
                expected: P::DECIMALS,
                found: self.decimals,
            });
        }
        Ok(Scaled::from_raw(self.amount))
    }

    /// Same amount at another precision, e.g. a token size expressed at BASE
    /// precision for the margin curves.
    pub fn rescale<P: Precision>(self) -> MathResult<Scaled<P>> {
        shift_decimals(self.amount, self.decimals, P::DECIMALS, Rounding::Truncate, "token rescale")
            .map(Scaled::from_raw)
    }

    /// Quote value at `price`, truncated.
    pub fn value_in_quote(self, price: Price) -> MathResult<QuoteAmount> {
        self.quote_value(price, Rounding::Truncate)
    }

    pub fn value_in_quote_ceil(self, price: Price) -> MathResult<QuoteAmount> {
        self.quote_value(price, Rounding::Ceil)
    }

    fn quote_value(self, price: Price, rounding: Rounding) -> MathResult<QuoteAmount> {
        let product = self
            .amount
            .checked_mul(price.raw())
            .ok_or(InvariantViolation::Overflow("token value"))?;
        // token (d) * price (6) -> quote (6): drop d decimals
        let shift = QuotePrecision::DECIMALS as i64
            - (self.decimals as i64 + PricePrecision::DECIMALS as i64);
        div_with_shift(product, 1, shift, rounding, "token value").map(Scaled::from_raw)
    }

    /// Token amount worth `value` at `price`.
    pub fn from_quote_value(
        value: QuoteAmount,
        price: Price,
        decimals: u32,
        rounding: Rounding,
    ) -> MathResult<Self> {
        // quote (6) / price (6) -> token (d)
        let shift = decimals as i64 + PricePrecision::DECIMALS as i64
            - QuotePrecision::DECIMALS as i64;
        div_with_shift(value.raw(), price.raw(), shift, rounding, "token from value")
            .map(|amount| Self::new(amount, decimals))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Decimal::try_from_i128_with_scale(self.amount, self.decimals) {
            Ok(value) => write!(f, "{}", value),
            Err(_) => write!(f, "{}e-{}", self.amount, self.decimals),
        }
    }
}
