pub mod helper;

#[cfg(test)]
mod test_channel_requester;
#[cfg(test)]
mod test_channel_responder;
