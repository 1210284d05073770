use rand::Rng;

use std::fmt;

// CHARS for Chinese license plate
// provinces: [0, 31), digits: [31, 41), letters without I and O: [41, 65)
pub const CHARS: [char; 65] = ['京', '沪', '津', '渝', '冀', '晋', '蒙', '辽', '吉', '黑', '苏', '浙', '皖', '闽', '赣', '鲁', '豫', '鄂', '湘', '粤', '桂',
             '琼', '川', '贵', '云', '藏', '陕', '甘', '青', '宁', '新', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'A',
             'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X',
             'Y', 'Z'
             ];

const PROVINCE_END: usize = 31;
const DIGIT_END: usize = 41;

/// Character class permitted at a plate position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Province,
    Letter,
    Alphanumeric,
}

impl CharClass {

    pub fn at(position: usize) -> Self {
        match position {
            0 => CharClass::Province,
            1 => CharClass::Letter,
            _ => CharClass::Alphanumeric,
        }
    }

    pub fn symbols(self) -> &'static [char] {
        match self {
            CharClass::Province => &CHARS[..PROVINCE_END],
            CharClass::Letter => &CHARS[DIGIT_END..],
            CharClass::Alphanumeric => &CHARS[PROVINCE_END..],
        }
    }

    pub fn contains(self, symbol: char) -> bool {
        self.symbols().contains(&symbol)
    }
}

/// Character-count variant of a plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlateFormat {
    /// blue or yellow plate, 7 glyphs
    Common,
    /// green new-energy plate, 8 glyphs
    NewEnergy,
}

impl PlateFormat {
    pub fn len(self) -> usize {
        match self {
            PlateFormat::Common => 7,
            PlateFormat::NewEnergy => 8,
        }
    }
}

/// Forces one position of a generated string to a fixed symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pin {
    pub position: usize,
    pub symbol: char,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlateString(Vec<char>);

impl PlateString {

    pub fn new(symbols: Vec<char>) -> Self {
        Self(symbols)
    }

    pub fn symbols(&self) -> &[char] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// true when every symbol belongs to its position's class
    pub fn is_well_formed(&self) -> bool {
        self.0.iter().enumerate().all(|(i, c)| CharClass::at(i).contains(*c))
    }
}

impl From<&str> for PlateString {
    fn from(s: &str) -> Self {
        Self(s.chars().collect())
    }
}

impl fmt::Display for PlateString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|c| write!(f, "{}", c))
    }
}

/// Generates plate identifiers under the positional class rules.
#[derive(Debug, Clone, Copy)]
pub struct StringPolicy {
    format: PlateFormat,
}

impl StringPolicy {

    pub fn new(format: PlateFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> PlateFormat {
        self.format
    }

    /// The pinned symbol is taken verbatim without class validation.
    /// A pin past the end of the plate has no effect.
    pub fn generate<R: Rng>(&self, pin: Option<Pin>, rng: &mut R) -> PlateString {
        let symbols = (0..self.format.len()).map(|position| {
            match pin {
                Some(pin) if pin.position == position => pin.symbol,
                _ => {
                    let class = CharClass::at(position).symbols();
                    class[rng.gen_range(0..class.len())]
                }
            }
        }).collect();
        PlateString::new(symbols)
    }
}


#[cfg(test)]
mod test {

    use rand::{ SeedableRng, rngs::StdRng };

    use super::{ CharClass, Pin, PlateFormat, PlateString, StringPolicy };

    #[test]
    fn class_sizes() {
        assert_eq!(CharClass::Province.symbols().len(), 31);
        assert_eq!(CharClass::Letter.symbols().len(), 24);
        assert_eq!(CharClass::Alphanumeric.symbols().len(), 34);
        assert!(!CharClass::Letter.contains('I'));
        assert!(!CharClass::Letter.contains('O'));
        assert!(!CharClass::Letter.contains('1'));
        assert!(CharClass::Alphanumeric.contains('1'));
        assert!(!CharClass::Alphanumeric.contains('京'));
    }

    #[test]
    fn positions_follow_class_rules() {
        let mut rng = StdRng::seed_from_u64(7);
        for format in [PlateFormat::Common, PlateFormat::NewEnergy].iter() {
            let policy = StringPolicy::new(*format);
            for _ in 0..500 {
                let plate = policy.generate(None, &mut rng);
                assert_eq!(plate.len(), format.len());
                assert!(plate.is_well_formed(), "bad plate {}", plate);
            }
        }
    }

    #[test]
    fn pinned_position_over_many_draws() {
        let mut rng = StdRng::seed_from_u64(42);
        let policy = StringPolicy::new(PlateFormat::Common);
        let pin = Pin { position: 2, symbol: 'A' };
        for _ in 0..1000 {
            let plate = policy.generate(Some(pin), &mut rng);
            assert_eq!(plate.symbols()[2], 'A');
            assert!(CharClass::Province.contains(plate.symbols()[0]));
            assert!(CharClass::Letter.contains(plate.symbols()[1]));
        }
    }

    #[test]
    fn pin_is_not_validated() {
        let mut rng = StdRng::seed_from_u64(1);
        let policy = StringPolicy::new(PlateFormat::NewEnergy);
        let plate = policy.generate(Some(Pin { position: 0, symbol: 'Z' }), &mut rng);
        assert_eq!(plate.symbols()[0], 'Z');
        assert!(!plate.is_well_formed());

        let plate = policy.generate(Some(Pin { position: 12, symbol: 'Z' }), &mut rng);
        assert_eq!(plate.len(), 8);
    }

    #[test]
    fn same_seed_same_plate() {
        let policy = StringPolicy::new(PlateFormat::Common);
        let a = policy.generate(None, &mut StdRng::seed_from_u64(99));
        let b = policy.generate(None, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn display_round_trips_str() {
        let plate = PlateString::from("京A12345");
        assert_eq!(plate.len(), 7);
        assert_eq!(plate.to_string(), "京A12345");
        assert!(plate.is_well_formed());
    }
}
