//! Message-type constants (spec §6.2), reproduced verbatim from
//! `skypedata.py`'s `MESSAGE_TYPE_*`/`CHATMSG_TYPE_*`/`TRANSFER_TYPE_*`.

pub const MESSAGE_TYPE_TOPIC: i64 = 2;
pub const MESSAGE_TYPE_GROUP: i64 = 4;
pub const MESSAGE_TYPE_UPDATE_DONE: i64 = 8;
pub const MESSAGE_TYPE_UPDATE_NEED: i64 = 9;
pub const MESSAGE_TYPE_PARTICIPANTS: i64 = 10;
pub const MESSAGE_TYPE_REMOVE: i64 = 12;
pub const MESSAGE_TYPE_LEAVE: i64 = 13;
pub const MESSAGE_TYPE_CALL: i64 = 30;
pub const MESSAGE_TYPE_CALL_END: i64 = 39;
pub const MESSAGE_TYPE_INTRO: i64 = 50;
pub const MESSAGE_TYPE_SHARE_DETAIL: i64 = 51;
pub const MESSAGE_TYPE_BLOCK: i64 = 53;
pub const MESSAGE_TYPE_INFO: i64 = 60;
pub const MESSAGE_TYPE_MESSAGE: i64 = 61;
pub const MESSAGE_TYPE_CONTACTS: i64 = 63;
pub const MESSAGE_TYPE_SMS: i64 = 64;
pub const MESSAGE_TYPE_FILE: i64 = 68;
pub const MESSAGE_TYPE_SHARE_VIDEO: i64 = 70;
pub const MESSAGE_TYPE_BIRTHDAY: i64 = 110;
pub const MESSAGE_TYPE_SHARE_PHOTO: i64 = 201;
pub const MESSAGE_TYPE_SHARE_VIDEO2: i64 = 253;

pub const CHATMSG_TYPE_PARTICIPANTS: i64 = 1;
pub const CHATMSG_TYPE_PARTICIPANTS2: i64 = 2;
pub const CHATMSG_TYPE_MESSAGE: i64 = 3;
pub const CHATMSG_TYPE_LEAVE: i64 = 4;
pub const CHATMSG_TYPE_TOPIC: i64 = 5;
pub const CHATMSG_TYPE_ACCEPT: i64 = 6;
pub const CHATMSG_TYPE_SPECIAL: i64 = 7;
pub const CHATMSG_TYPE_CONTACTS: i64 = 8;
pub const CHATMSG_TYPE_REMOVE: i64 = 11;
pub const CHATMSG_TYPE_PICTURE: i64 = 15;
pub const CHATMSG_TYPE_SPECIAL2: i64 = 18;

pub const TRANSFER_TYPE_OUTBOUND: i64 = 1;
pub const TRANSFER_TYPE_INBOUND: i64 = 2;

pub const MESSAGE_REMOVED_TEXT: &str = "This message has been removed.";

pub const FAILURE_REASON_1: &str = "Failed";
pub const FAILURE_REASON_4: &str = "Not enough Skype Credit.";

pub fn failure_reason(code: &str) -> Option<&'static str> {
    match code {
        "1" => Some(FAILURE_REASON_1),
        "4" => Some(FAILURE_REASON_4),
        _ => None,
    }
}
