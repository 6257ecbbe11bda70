// Implementations of the domain interfaces.
// identity hands out connection ids, engine forwards commands to the native engine over a channel.

pub(crate) mod engine;
pub(crate) mod identity;
