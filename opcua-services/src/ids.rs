//! Binary encoding ids of the structures this stack speaks

use opcua_core::NodeId;

/// Namespace 0 object ids of `DefaultBinary` encodings
pub struct ObjectId;

impl ObjectId {
    pub const ANONYMOUS_IDENTITY_TOKEN: u32 = 321;
    pub const USER_NAME_IDENTITY_TOKEN: u32 = 324;
    pub const X509_IDENTITY_TOKEN: u32 = 327;
    pub const SERVICE_FAULT: u32 = 397;
    pub const OPEN_SECURE_CHANNEL_REQUEST: u32 = 446;
    pub const OPEN_SECURE_CHANNEL_RESPONSE: u32 = 449;
    pub const CLOSE_SECURE_CHANNEL_REQUEST: u32 = 452;
    pub const CLOSE_SECURE_CHANNEL_RESPONSE: u32 = 455;
    pub const CREATE_SESSION_REQUEST: u32 = 461;
    pub const CREATE_SESSION_RESPONSE: u32 = 464;
    pub const ACTIVATE_SESSION_REQUEST: u32 = 467;
    pub const ACTIVATE_SESSION_RESPONSE: u32 = 470;
    pub const CLOSE_SESSION_REQUEST: u32 = 473;
    pub const CLOSE_SESSION_RESPONSE: u32 = 476;
    pub const READ_REQUEST: u32 = 631;
    pub const READ_RESPONSE: u32 = 634;
    pub const WRITE_REQUEST: u32 = 673;
    pub const WRITE_RESPONSE: u32 = 676;
    pub const CREATE_MONITORED_ITEMS_REQUEST: u32 = 751;
    pub const CREATE_MONITORED_ITEMS_RESPONSE: u32 = 754;
    pub const DELETE_MONITORED_ITEMS_REQUEST: u32 = 781;
    pub const DELETE_MONITORED_ITEMS_RESPONSE: u32 = 784;
    pub const CREATE_SUBSCRIPTION_REQUEST: u32 = 787;
    pub const CREATE_SUBSCRIPTION_RESPONSE: u32 = 790;
    pub const MODIFY_SUBSCRIPTION_REQUEST: u32 = 793;
    pub const MODIFY_SUBSCRIPTION_RESPONSE: u32 = 796;
    pub const SET_PUBLISHING_MODE_REQUEST: u32 = 799;
    pub const SET_PUBLISHING_MODE_RESPONSE: u32 = 802;
    pub const DATA_CHANGE_NOTIFICATION: u32 = 811;
    pub const STATUS_CHANGE_NOTIFICATION: u32 = 820;
    pub const PUBLISH_REQUEST: u32 = 826;
    pub const PUBLISH_RESPONSE: u32 = 829;
    pub const REPUBLISH_REQUEST: u32 = 832;
    pub const REPUBLISH_RESPONSE: u32 = 835;
    pub const TRANSFER_SUBSCRIPTIONS_REQUEST: u32 = 841;
    pub const TRANSFER_SUBSCRIPTIONS_RESPONSE: u32 = 844;
    pub const DELETE_SUBSCRIPTIONS_REQUEST: u32 = 847;
    pub const DELETE_SUBSCRIPTIONS_RESPONSE: u32 = 850;

    pub const fn node_id(id: u32) -> NodeId {
        NodeId::numeric(0, id)
    }
}
