use crate::domain::Address;

// ============== Authorization ==============

/// Single-owner check. With no owner configured every sender is accepted.
pub fn is_authorized(sender: &Address, owner: Option<&Address>) -> bool {
    let Some(owner) = owner else {
        return true;
    };
    sender.normalized() == owner.normalized()
}
