//! Per-endpoint status messages, as documented for each CouchDB operation.

use crate::status::StatusTable;

pub const SERVER_INFO: &StatusTable = &[(200, "OK - Request completed successfully")];

pub const ALL_DBS: &StatusTable = &[(200, "OK - Request completed successfully")];

pub const UUIDS: &StatusTable = &[
    (200, "OK - Request completed successfully"),
    (400, "Bad Request - Requested more UUIDs than is allowed to retrieve"),
];

pub const CREATE_DATABASE: &StatusTable = &[
    (201, "Created - Database created successfully"),
    (400, "Bad Request - Invalid database name"),
    (401, "Unauthorized - CouchDB Server Administrator privileges required"),
    (412, "Precondition Failed - Database already exists"),
];

pub const GET_DATABASE: &StatusTable = &[
    (200, "OK - Request completed successfully"),
    (404, "Not Found - Requested database not found"),
];

pub const DELETE_DATABASE: &StatusTable = &[
    (200, "OK - Database removed successfully"),
    (400, "Bad Request - Invalid database name or forgotten document id by accident"),
    (401, "Unauthorized - CouchDB Server Administrator privileges required"),
    (404, "Not Found - Database doesn't exist"),
];

pub const ALL_DOCS: &StatusTable = &[
    (200, "OK - Request completed successfully"),
    (404, "Not Found - Requested database not found"),
];

pub const POST_DOCUMENT: &StatusTable = &[
    (201, "Created - Document created and stored on disk"),
    (202, "Accepted - Document data accepted, but not yet stored on disk"),
    (400, "Bad Request - Invalid database name"),
    (401, "Unauthorized - Write privileges required"),
    (404, "Not Found - Database doesn't exist"),
    (409, "Conflict - A Conflicting Document with same ID already exists"),
];

pub const PUT_DOCUMENT: &StatusTable = &[
    (201, "Created - Document created and stored on disk"),
    (202, "Accepted - Document data accepted, but not yet stored on disk"),
    (400, "Bad Request - Invalid request body or parameters"),
    (401, "Unauthorized - Write privileges required"),
    (404, "Not Found - Specified database or document ID doesn't exists"),
    (409, "Conflict - Document with the specified ID already exists or specified revision is not latest for target document"),
];

pub const GET_DOCUMENT: &StatusTable = &[
    (200, "OK - Request completed successfully"),
    (304, "Not Modified - Document wasn't modified since specified revision"),
    (400, "Bad Request - The format of the request or revision was invalid"),
    (401, "Unauthorized - Read privilege required"),
    (404, "Not Found - Document not found"),
];

pub const DELETE_DOCUMENT: &StatusTable = &[
    (200, "OK - Document successfully removed"),
    (202, "Accepted - Request was accepted, but changes are not yet stored on disk"),
    (400, "Bad Request - Invalid request body or parameters"),
    (401, "Unauthorized - Write privileges required"),
    (404, "Not Found - Specified database or document ID doesn't exists"),
    (409, "Conflict - Specified revision is not the latest for target document"),
];

pub const COPY_DOCUMENT: &StatusTable = &[
    (201, "Created - Document successfully created"),
    (202, "Accepted - Request was accepted, but changes are not yet stored on disk"),
    (400, "Bad Request - Invalid request body or parameters"),
    (401, "Unauthorized - Read or write privileges required"),
    (404, "Not Found - Specified database, document ID or revision doesn't exists"),
    (409, "Conflict - Document with the specified ID already exists or specified revision is not latest for target document"),
];

pub const FIND: &StatusTable = &[
    (200, "OK - Request completed successfully"),
    (400, "Bad Request - Invalid request"),
    (401, "Unauthorized - Read permission required"),
    (404, "Not Found - Requested database not found"),
    (500, "Internal Server Error - Query execution error"),
];

pub const BULK_DOCS: &StatusTable = &[
    (201, "Created - Document(s) have been created or updated"),
    (400, "Bad Request - The request provided invalid JSON data"),
    (404, "Not Found - Requested database not found"),
    (417, "Expectation Failed - Occurs when all_or_nothing option set as true and at least one document was rejected by validation function"),
    (500, "Internal Server Error - Malformed data provided, while it's still valid JSON"),
];

pub const DESIGN_INFO: &StatusTable = &[
    (200, "OK - Request completed successfully"),
    (404, "Not Found - Design document not found"),
];

pub const VIEW: &StatusTable = &[
    (200, "OK - Request completed successfully"),
    (400, "Bad Request - Invalid request"),
    (401, "Unauthorized - Read permission required"),
    (404, "Not Found - Specified database, design document or view is missed"),
    (500, "Internal Server Error - View function execution error"),
];

pub const CREATE_INDEX: &StatusTable = &[
    (200, "OK - Index created successfully or already exists"),
    (400, "Bad Request - Invalid request"),
    (401, "Unauthorized - Admin permission required"),
    (404, "Not Found - Requested database not found"),
    (500, "Internal Server Error - Execution error"),
];

pub const GET_INDEXES: &StatusTable = &[
    (200, "OK - Success"),
    (400, "Bad Request - Invalid request"),
    (401, "Unauthorized - Read permission required"),
    (404, "Not Found - Requested database not found"),
    (500, "Internal Server Error - Execution error"),
];

pub const DELETE_INDEX: &StatusTable = &[
    (200, "OK - Success"),
    (400, "Bad Request - Invalid request"),
    (401, "Unauthorized - Writer permission required"),
    (404, "Not Found - Index not found"),
    (500, "Internal Server Error - Execution error"),
];

pub const PUT_ATTACHMENT: &StatusTable = &[
    (201, "Created - Attachment created and stored on disk"),
    (202, "Accepted - Request was accepted, but changes are not yet stored on disk"),
    (400, "Bad Request - Invalid request body or parameters"),
    (401, "Unauthorized - Write privileges required"),
    (404, "Not Found - Specified database, document or attachment was not found"),
    (409, "Conflict - Document's revision wasn't specified or it's not the latest"),
];

pub const GET_ATTACHMENT: &StatusTable = &[
    (200, "OK - Attachment exists"),
    (304, "Not Modified - Attachment wasn't modified if ETag equals specified If-None-Match header"),
    (401, "Unauthorized - Read privilege required"),
    (404, "Not Found - Specified database, document or attachment was not found"),
];

pub const DELETE_ATTACHMENT: &StatusTable = &[
    (200, "OK - Attachment successfully removed"),
    (202, "Accepted - Request was accepted, but changes are not yet stored on disk"),
    (400, "Bad Request - Invalid request body or parameters"),
    (401, "Unauthorized - Write privileges required"),
    (404, "Not Found - Specified database, document or attachment was not found"),
    (409, "Conflict - Document's revision wasn't specified or it's not the latest"),
];
