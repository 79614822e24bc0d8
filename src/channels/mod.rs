mod locator;

pub use locator::{
    find_channel, find_member_channel, load_conversation, load_messages, resolve_senders,
    Conversation, MessageView, CHANNELS, MESSAGES,
};
