//! Confirmation state of email-verifiable values across writes.

use crate::error::{AttributeError, AttributeResult, ValidationResult};
use crate::model::Attribute;
use crate::syntax::{AttributeValueSyntax, ConfirmationInfo};

/// Mark every value of the attribute as confirmed now.
pub fn set_confirmed(attribute: &mut Attribute, syntax: &dyn AttributeValueSyntax) -> ValidationResult<()> {
    set_confirmation(attribute, syntax, &ConfirmationInfo::confirmed_now())
}

/// Mark every value of the attribute as unconfirmed.
pub fn set_unconfirmed(attribute: &mut Attribute, syntax: &dyn AttributeValueSyntax) -> ValidationResult<()> {
    set_confirmation(attribute, syntax, &ConfirmationInfo::unconfirmed())
}

fn set_confirmation(
    attribute: &mut Attribute,
    syntax: &dyn AttributeValueSyntax,
    info: &ConfirmationInfo,
) -> ValidationResult<()> {
    for value in attribute.values.iter_mut() {
        *value = syntax.with_confirmation(value, info)?;
    }
    Ok(())
}

/// Fix the confirmation state of `attribute` before it is written.
///
/// Privileged writes and syntaxes without email verification are left alone.
/// Otherwise every value starts unconfirmed, except values equal to one of
/// `existing`, which keep the confirmation of that value. When `existing`
/// had a confirmed value, at least one confirmed value has to survive.
pub fn reconcile(
    attribute: &mut Attribute,
    existing: Option<&Attribute>,
    syntax: &dyn AttributeValueSyntax,
    privileged: bool,
) -> AttributeResult<()> {
    if privileged || !syntax.is_email_verifiable() {
        return Ok(());
    }
    let Some(existing) = existing else {
        set_unconfirmed(attribute, syntax)?;
        return Ok(());
    };

    let mut confirmed_preserved = false;
    for value in attribute.values.iter_mut() {
        let previous = existing
            .values
            .iter()
            .find(|old| syntax.are_equal(value.as_str(), old))
            .and_then(|old| syntax.confirmation_info(old));
        let info = match previous {
            Some(info) => {
                confirmed_preserved |= info.confirmed;
                info
            }
            None => ConfirmationInfo::unconfirmed(),
        };
        *value = syntax.with_confirmation(value, &info)?;
    }

    let had_confirmed = existing
        .values
        .iter()
        .filter_map(|old| syntax.confirmation_info(old))
        .any(|info| info.confirmed);
    if had_confirmed && !confirmed_preserved {
        return Err(AttributeError::confirmation_state(format!(
            "At least one confirmed value of '{}' must be preserved",
            attribute.name
        )));
    }
    Ok(())
}
