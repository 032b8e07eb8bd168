//! HTTP status code to message resolution.

/// Status code to message mapping.
pub type StatusTable = [(u16, &'static str)];

pub const UNKNOWN_STATUS: &str = "unknown status";

/// Messages used when an endpoint table has no entry for a code.
pub const GENERIC: &StatusTable = &[
    (200, "OK - Request completed successfully"),
    (201, "Created - Document created successfully"),
    (202, "Accepted - Request has been accepted, but the corresponding operation may not have completed"),
    (304, "Not Modified - The additional content requested has not been modified"),
    (400, "Bad Request - Bad request structure"),
    (401, "Unauthorized - Access was denied because of invalid credentials"),
    (403, "Forbidden - The requested item or operation is forbidden"),
    (404, "Not Found - The requested content could not be found"),
    (405, "Method Not Allowed - A request was made using an invalid HTTP request type"),
    (406, "Not Acceptable - The requested content type is not supported by the server"),
    (409, "Conflict - Request resulted in an update conflict"),
    (412, "Precondition Failed - The request headers do not match the current state of the server"),
    (413, "Request Entity Too Large - The request body is larger than the server accepts"),
    (415, "Unsupported Media Type - The content type of the submitted information is not supported"),
    (416, "Requested Range Not Satisfiable - The range specified in the request header cannot be satisfied"),
    (417, "Expectation Failed - The bulk load operation failed"),
    (500, "Internal Server Error - The request was invalid or an internal error occurred"),
];

fn lookup<'a>(table: &'a [(u16, &'a str)], code: u16) -> Option<&'a str> {
    table.iter().find(|(c, _)| *c == code).map(|(_, message)| *message)
}

/// Message for `code`: the override table first, then [`GENERIC`], then
/// [`UNKNOWN_STATUS`].
pub fn resolve<'a>(code: u16, overrides: &'a [(u16, &'a str)]) -> &'a str {
    lookup(overrides, code)
        .or_else(|| lookup(GENERIC, code))
        .unwrap_or(UNKNOWN_STATUS)
}
