pub mod customer;
pub mod history;
pub mod order;
pub mod otp;
pub mod partner;

/// Phone numbers are the identity of every account: exactly ten ASCII digits.
pub fn is_valid_phone(phone: &str) -> bool {
    phone.len() == 10 && phone.bytes().all(|b| b.is_ascii_digit())
}
