//! Memory banking: access control, base registers, bank descriptors and
//! virtual addresses.

use bitflags::bitflags;

use crate::storage::AbsoluteAddress;
use crate::word::Word36;

/// Ring/domain pair used for privilege comparison between an access key
/// and a bank's access lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessInfo {
    pub ring: u8,
    pub domain: u16,
}

impl AccessInfo {
    #[must_use]
    pub const fn new(ring: u8, domain: u16) -> Self {
        AccessInfo { ring, domain }
    }

    /// The 18-bit key form: ring in the top two bits, domain below.
    #[must_use]
    pub fn as_half_word(self) -> u64 {
        (u64::from(self.ring & 0o3) << 16) | u64::from(self.domain)
    }

    #[must_use]
    pub fn from_half_word(half: u64) -> Self {
        AccessInfo {
            ring: ((half >> 16) & 0o3) as u8,
            domain: (half & 0o177777) as u16,
        }
    }
}

bitflags! {
    /// Enter (execute), read and write permission bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AccessPermissions: u8 {
        const ENTER = 0o4;
        const READ  = 0o2;
        const WRITE = 0o1;
    }
}

impl AccessPermissions {
    #[must_use]
    pub const fn can_enter(self) -> bool {
        self.contains(Self::ENTER)
    }

    #[must_use]
    pub const fn can_read(self) -> bool {
        self.contains(Self::READ)
    }

    #[must_use]
    pub const fn can_write(self) -> bool {
        self.contains(Self::WRITE)
    }
}

/// A base register describing one based bank. A void register describes
/// no storage at all.
///
/// The base address is pre-adjusted downward by the bank's lower limit,
/// so address formation is always `base + relative`, even for banks with
/// non-zero lower limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseRegister {
    pub void_flag: bool,
    pub large_size: bool,
    pub base_address: AbsoluteAddress,
    pub lower_limit_normalized: u64,
    pub upper_limit_normalized: u64,
    pub access_lock: AccessInfo,
    pub general_permissions: AccessPermissions,
    pub special_permissions: AccessPermissions,
}

impl Default for BaseRegister {
    fn default() -> Self {
        BaseRegister {
            void_flag: true,
            large_size: false,
            base_address: AbsoluteAddress::default(),
            lower_limit_normalized: 0,
            upper_limit_normalized: 0,
            access_lock: AccessInfo::default(),
            general_permissions: AccessPermissions::empty(),
            special_permissions: AccessPermissions::empty(),
        }
    }
}

impl BaseRegister {
    /// Whether a relative address falls inside the bank's limits. A void
    /// bank contains nothing.
    #[must_use]
    pub fn contains(&self, relative_address: u64) -> bool {
        !self.void_flag
            && relative_address >= self.lower_limit_normalized
            && relative_address <= self.upper_limit_normalized
    }

    /// The permission set in effect for a requester with the given key:
    /// special permissions when the requester's ring is more privileged
    /// than the lock's, or when the domains match; general otherwise.
    #[must_use]
    pub fn effective_permissions(&self, key: AccessInfo) -> AccessPermissions {
        if key.ring < self.access_lock.ring || key.domain == self.access_lock.domain {
            self.special_permissions
        } else {
            self.general_permissions
        }
    }

    /// Absolute address of a relative address within this bank. Callers
    /// check limits first.
    #[must_use]
    pub fn absolute_address(&self, relative_address: u64) -> AbsoluteAddress {
        self.base_address
            .with_offset_added(relative_address - self.lower_limit_normalized)
    }

    /// The four-word dump format used by the base-register load/store
    /// instructions (SBED, LBED, SBUD, LBUD):
    ///
    /// - word 0: general permissions in S1 bits 3-5, special in bits 0-2,
    ///   void/large flags in S2, access lock in H2;
    /// - word 1: UPI in T1, normalized lower limit in the low 24 bits;
    /// - word 2: segment in T1, normalized upper limit in the low 24 bits;
    /// - word 3: base address offset.
    #[must_use]
    pub fn to_words(&self) -> [Word36; 4] {
        let mut word0 = Word36::POSITIVE_ZERO;
        word0.set_s1(
            (u64::from(self.general_permissions.bits()) << 3)
                | u64::from(self.special_permissions.bits()),
        );
        let mut flags = 0;
        if self.void_flag {
            flags |= 0o1;
        }
        if self.large_size {
            flags |= 0o2;
        }
        word0.set_s2(flags);
        word0.set_h2(self.access_lock.as_half_word());

        [
            word0,
            Word36::new(
                (u64::from(self.base_address.upi & 0o7777) << 24)
                    | (self.lower_limit_normalized & 0o77_777777),
            ),
            Word36::new(
                (u64::from(self.base_address.segment & 0o7777) << 24)
                    | (self.upper_limit_normalized & 0o77_777777),
            ),
            Word36::new(self.base_address.offset),
        ]
    }

    /// Inverse of [`BaseRegister::to_words`].
    #[must_use]
    pub fn from_words(words: [Word36; 4]) -> Self {
        let flags = words[0].s2();
        BaseRegister {
            void_flag: flags & 0o1 != 0,
            large_size: flags & 0o2 != 0,
            base_address: AbsoluteAddress::new(
                words[1].t1() as u16,
                words[2].t1() as u16,
                words[3].raw(),
            ),
            lower_limit_normalized: words[1].raw() & 0o77_777777,
            upper_limit_normalized: words[2].raw() & 0o77_777777,
            access_lock: AccessInfo::from_half_word(words[0].h2()),
            general_permissions: AccessPermissions::from_bits_truncate(
                ((words[0].s1() >> 3) & 0o7) as u8,
            ),
            special_permissions: AccessPermissions::from_bits_truncate(
                (words[0].s1() & 0o7) as u8,
            ),
        }
    }
}

/// Bank types carried in a bank descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankType {
    ExtendedMode,
    BasicMode,
    Gate,
    Indirect,
    QueueRepository,
    Reserved(u8),
}

impl BankType {
    #[must_use]
    pub fn from_code(code: u64) -> Self {
        match code & 0o17 {
            0 => BankType::ExtendedMode,
            1 => BankType::BasicMode,
            2 => BankType::Gate,
            3 => BankType::Indirect,
            4 => BankType::QueueRepository,
            other => BankType::Reserved(other as u8),
        }
    }

    #[must_use]
    pub fn code(self) -> u64 {
        match self {
            BankType::ExtendedMode => 0,
            BankType::BasicMode => 1,
            BankType::Gate => 2,
            BankType::Indirect => 3,
            BankType::QueueRepository => 4,
            BankType::Reserved(code) => u64::from(code),
        }
    }
}

/// Size of a bank descriptor, in words.
pub const BANK_DESCRIPTOR_WORDS: u64 = 8;

/// A bank descriptor, the 8-word structure from which base registers are
/// loaded. Word layout:
///
/// - word 0: general/special permissions and flags as in the
///   base-register dump format, bank type in S3, access lock in H2;
/// - word 1: normalized lower limit;
/// - word 2: normalized upper limit;
/// - word 3: base address offset;
/// - word 4: target level and BDI for indirect descriptors;
/// - word 5: base address UPI in T1, segment in T2;
/// - words 6-7: reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BankDescriptor {
    pub bank_type_code: u64,
    pub general_permissions: AccessPermissions,
    pub special_permissions: AccessPermissions,
    pub access_lock: AccessInfo,
    pub large_size: bool,
    pub general_fault: bool,
    pub lower_limit_normalized: u64,
    pub upper_limit_normalized: u64,
    pub base_address: AbsoluteAddress,
    pub target_level: u64,
    pub target_bank_descriptor_index: u64,
}

impl BankDescriptor {
    #[must_use]
    pub fn bank_type(&self) -> BankType {
        BankType::from_code(self.bank_type_code)
    }

    #[must_use]
    pub fn from_words(words: [Word36; 8]) -> Self {
        let flags = words[0].s2();
        BankDescriptor {
            bank_type_code: words[0].s3() & 0o17,
            general_permissions: AccessPermissions::from_bits_truncate(
                ((words[0].s1() >> 3) & 0o7) as u8,
            ),
            special_permissions: AccessPermissions::from_bits_truncate(
                (words[0].s1() & 0o7) as u8,
            ),
            access_lock: AccessInfo::from_half_word(words[0].h2()),
            large_size: flags & 0o2 != 0,
            general_fault: flags & 0o4 != 0,
            lower_limit_normalized: words[1].raw(),
            upper_limit_normalized: words[2].raw(),
            base_address: AbsoluteAddress::new(
                words[5].t1() as u16,
                words[5].t2() as u16,
                words[3].raw(),
            ),
            target_level: words[4].raw() >> 33,
            target_bank_descriptor_index: words[4].h1() & 0o77777,
        }
    }

    #[must_use]
    pub fn to_words(&self) -> [Word36; 8] {
        let mut word0 = Word36::POSITIVE_ZERO;
        word0.set_s1(
            (u64::from(self.general_permissions.bits()) << 3)
                | u64::from(self.special_permissions.bits()),
        );
        let mut flags = 0;
        if self.large_size {
            flags |= 0o2;
        }
        if self.general_fault {
            flags |= 0o4;
        }
        word0.set_s2(flags);
        word0.set_s3(self.bank_type_code & 0o17);
        word0.set_h2(self.access_lock.as_half_word());

        let word4 = Word36::new(
            ((self.target_level & 0o7) << 33)
                | ((self.target_bank_descriptor_index & 0o77777) << 18),
        );

        let mut word5 = Word36::POSITIVE_ZERO;
        word5.set_t1(u64::from(self.base_address.upi));
        word5.set_t2(u64::from(self.base_address.segment));

        [
            word0,
            Word36::new(self.lower_limit_normalized),
            Word36::new(self.upper_limit_normalized),
            Word36::new(self.base_address.offset),
            word4,
            word5,
            Word36::POSITIVE_ZERO,
            Word36::POSITIVE_ZERO,
        ]
    }

    /// Builds the base register describing this bank.
    #[must_use]
    pub fn base_register(&self) -> BaseRegister {
        BaseRegister {
            void_flag: false,
            large_size: self.large_size,
            base_address: self.base_address,
            lower_limit_normalized: self.lower_limit_normalized,
            upper_limit_normalized: self.upper_limit_normalized,
            access_lock: self.access_lock,
            general_permissions: self.general_permissions,
            special_permissions: self.special_permissions,
        }
    }
}

//  ---------------------------------------------------------------------
//  Virtual addresses
//  ---------------------------------------------------------------------

/// Translates the basic-mode exec/level flag pair to the extended-mode
/// bank level.
#[must_use]
pub fn basic_to_extended_level(exec_flag: bool, level_flag: bool) -> u64 {
    match (exec_flag, level_flag) {
        (true, false) => 0,
        (true, true) => 2,
        (false, false) => 4,
        (false, true) => 6,
    }
}

/// Inverse of [`basic_to_extended_level`]; odd levels have no basic-mode
/// encoding.
#[must_use]
pub fn extended_to_basic_level(level: u64) -> Option<(bool, bool)> {
    match level {
        0 => Some((true, false)),
        2 => Some((true, true)),
        4 => Some((false, false)),
        6 => Some((false, true)),
        _ => None,
    }
}

const BASIC_EXEC_FLAG: u64 = 0o400000_000000;
const BASIC_LEVEL_FLAG: u64 = 0o040000_000000;

/// A virtual address in its extended-mode form: level, bank descriptor
/// index and offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VirtualAddress(Word36);

impl VirtualAddress {
    #[must_use]
    pub fn from_extended(level: u64, bdi: u64, offset: u64) -> Self {
        VirtualAddress(Word36::new(
            ((level & 0o7) << 33) | ((bdi & 0o77777) << 18) | (offset & 0o777777),
        ))
    }

    /// Builds from the basic-mode exec/level flag encoding.
    #[must_use]
    pub fn from_basic(exec_flag: bool, level_flag: bool, bdi: u64, offset: u64) -> Self {
        Self::from_extended(
            basic_to_extended_level(exec_flag, level_flag),
            bdi & 0o7777,
            offset,
        )
    }

    #[must_use]
    pub const fn word(self) -> Word36 {
        self.0
    }

    #[must_use]
    pub fn from_word(word: Word36) -> Self {
        VirtualAddress(word)
    }

    /// Decodes a word in the basic-mode E/LS/BDI/offset layout.
    #[must_use]
    pub fn from_basic_word(word: Word36) -> Self {
        let exec_flag = word.raw() & BASIC_EXEC_FLAG != 0;
        let level_flag = word.raw() & BASIC_LEVEL_FLAG != 0;
        Self::from_basic(exec_flag, level_flag, word.h1() & 0o7777, word.h2())
    }

    #[must_use]
    pub const fn level(self) -> u64 {
        self.0.raw() >> 33
    }

    #[must_use]
    pub const fn bank_descriptor_index(self) -> u64 {
        self.0.h1() & 0o77777
    }

    #[must_use]
    pub const fn offset(self) -> u64 {
        self.0.h2()
    }

    /// Renders this address in the basic-mode E/LS/BDI/offset layout.
    /// Addresses outside the basic-mode range (odd level, or a BDI wider
    /// than 12 bits) render as the void exec encoding, keeping the
    /// translation total.
    #[must_use]
    pub fn to_basic_word(self) -> Word36 {
        let bdi = self.bank_descriptor_index();
        if bdi <= 0o7777 {
            if let Some((exec_flag, level_flag)) = extended_to_basic_level(self.level()) {
                let mut value = (bdi << 18) | self.offset();
                if exec_flag {
                    value |= BASIC_EXEC_FLAG;
                }
                if level_flag {
                    value |= BASIC_LEVEL_FLAG;
                }
                return Word36::new(value);
            }
        }

        Word36::new(BASIC_EXEC_FLAG | BASIC_LEVEL_FLAG | self.offset())
    }
}

impl std::fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{:o}:{:06o}",
            self.level(),
            self.bank_descriptor_index(),
            self.offset()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_info_half_word_round_trip() {
        let info = AccessInfo::new(2, 0o34567);
        assert_eq!(AccessInfo::from_half_word(info.as_half_word()), info);
    }

    #[test]
    fn effective_permissions_selection() {
        let bank = BaseRegister {
            void_flag: false,
            access_lock: AccessInfo::new(2, 0o100),
            general_permissions: AccessPermissions::READ,
            special_permissions: AccessPermissions::READ | AccessPermissions::WRITE,
            ..BaseRegister::default()
        };

        //  more privileged ring: special
        assert!(bank
            .effective_permissions(AccessInfo::new(0, 0o200))
            .can_write());
        //  same domain: special
        assert!(bank
            .effective_permissions(AccessInfo::new(3, 0o100))
            .can_write());
        //  less privileged, different domain: general
        assert!(!bank
            .effective_permissions(AccessInfo::new(3, 0o200))
            .can_write());
    }

    #[test]
    fn base_register_limits() {
        let bank = BaseRegister {
            void_flag: false,
            base_address: AbsoluteAddress::new(1, 0, 0o1000),
            lower_limit_normalized: 0o100,
            upper_limit_normalized: 0o177,
            ..BaseRegister::default()
        };

        assert!(!bank.contains(0o77));
        assert!(bank.contains(0o100));
        assert!(bank.contains(0o177));
        assert!(!bank.contains(0o200));

        //  base address is pre-adjusted by the lower limit
        assert_eq!(bank.absolute_address(0o100).offset, 0o1000);
        assert_eq!(bank.absolute_address(0o150).offset, 0o1050);

        let void = BaseRegister::default();
        assert!(!void.contains(0));
    }

    #[test]
    fn base_register_dump_round_trip() {
        let bank = BaseRegister {
            void_flag: false,
            large_size: true,
            base_address: AbsoluteAddress::new(3, 1, 0o1234),
            lower_limit_normalized: 0o100,
            upper_limit_normalized: 0o100177,
            access_lock: AccessInfo::new(1, 0o42),
            general_permissions: AccessPermissions::READ,
            special_permissions: AccessPermissions::READ | AccessPermissions::WRITE,
        };

        assert_eq!(BaseRegister::from_words(bank.to_words()), bank);
    }

    #[test]
    fn bank_descriptor_round_trip() {
        let descriptor = BankDescriptor {
            bank_type_code: BankType::BasicMode.code(),
            general_permissions: AccessPermissions::READ | AccessPermissions::ENTER,
            special_permissions: AccessPermissions::all(),
            access_lock: AccessInfo::new(0, 0o17),
            large_size: false,
            general_fault: false,
            lower_limit_normalized: 0o1000,
            upper_limit_normalized: 0o1777,
            base_address: AbsoluteAddress::new(1, 0, 0o4000),
            target_level: 0,
            target_bank_descriptor_index: 0,
        };

        assert_eq!(BankDescriptor::from_words(descriptor.to_words()), descriptor);
        assert_eq!(descriptor.bank_type(), BankType::BasicMode);
        assert!(!descriptor.base_register().void_flag);
    }

    #[test]
    fn virtual_address_round_trip() {
        //  every basic-representable triple survives both directions
        for (exec_flag, level_flag) in [(true, false), (true, true), (false, false), (false, true)]
        {
            let address = VirtualAddress::from_basic(exec_flag, level_flag, 0o1234, 0o55555);
            let basic = address.to_basic_word();
            assert_eq!(VirtualAddress::from_basic_word(basic), address);

            let level = basic_to_extended_level(exec_flag, level_flag);
            assert_eq!(address.level(), level);
            assert_eq!(extended_to_basic_level(level), Some((exec_flag, level_flag)));
        }

        //  odd levels have no basic form
        assert_eq!(extended_to_basic_level(3), None);
    }
}
