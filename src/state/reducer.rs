use crate::state::{
    entry::{Entry, DEFAULT_ERROR_MESSAGE},
    transition::{Change, Transition},
    tree::RootState,
};

/// Apply one transition to the tree, in place.
///
/// Lifecycle changes refresh `last_updated` to `now`; a reset puts the
/// synthesized default entry back. Changes at addresses that fail
/// [`RestAddress::check`](crate::address::RestAddress::check) are dropped.
pub fn reduce(state: &mut RootState, transition: &Transition, now: i64) {
    match transition {
        Transition::Logout => *state = RootState::default(),

        Transition::Local { address, value } => state.set_local(address, value.clone()),

        Transition::Rest { address, change } => {
            if let Err(e) = address.check() {
                tracing::warn!("dropping {}: {e}", change.discriminator());
                return;
            }

            let prior = state.entry(address).cloned().unwrap_or_default();
            state.set_entry(address, apply(prior, change, now));
        }
    }
}

fn apply(prior: Entry, change: &Change, now: i64) -> Entry {
    match change {
        Change::Loading => Entry {
            loading: true,
            error: None,
            executed: true,
            last_updated: Some(now),
            ..prior
        },
        Change::Data(payload) => Entry {
            data: (!payload.is_null()).then(|| payload.clone()),
            loading: false,
            error: None,
            executed: true,
            success: Some(true),
            last_updated: Some(now),
        },
        Change::Error(message) => Entry {
            data: None,
            loading: false,
            error: Some(
                message
                    .clone()
                    .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_owned()),
            ),
            executed: true,
            success: Some(false),
            last_updated: Some(now),
        },
        Change::Reset => Entry::synthesized(now),
    }
}
