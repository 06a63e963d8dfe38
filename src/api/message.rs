use super::{with_base_request, WebApi};
use crate::error::SendError;
use crate::protocol::{endpoint, generate_client_msg_id, APP_ID};
use crate::transport::{HttpRequest, MultipartField};
use crate::types::{
    BaseResponse, Credentials, Message, MsgType, SendMessageResponse, SentMessage,
    UploadMediaResponse,
};
use crate::Result;
use bytes::Bytes;
use md5::{Digest, Md5};
use serde_json::json;

/// What an uploaded file is sent as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    File,
}

impl MediaKind {
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("image/") {
            Self::Image
        } else if mime.starts_with("video/") {
            Self::Video
        } else {
            Self::File
        }
    }

    /// `mediatype` multipart field.
    fn upload_tag(&self) -> &'static str {
        match self {
            Self::Image => "pic",
            Self::Video => "video",
            Self::File => "doc",
        }
    }
}

/// Result of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedMedia {
    pub media_id: String,
    pub file_name: String,
    pub size: usize,
    pub mime: String,
    pub kind: MediaKind,
}

impl UploadedMedia {
    fn extension(&self) -> &str {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or_default()
    }
}

fn sent(resp: SendMessageResponse, to: &str, msg_type: i32, content: String) -> SentMessage {
    SentMessage {
        msg_id: resp.msg_id,
        local_id: resp.local_id,
        to_user_name: to.to_string(),
        msg_type,
        content,
    }
}

impl WebApi {
    pub async fn send_text(
        &self,
        creds: &Credentials,
        from: &str,
        to: &str,
        content: &str,
    ) -> Result<SentMessage> {
        let local_id = generate_client_msg_id();
        let req = HttpRequest::post(creds.domain.base_url(endpoint::SEND_MSG))
            .query("lang", "zh_CN")
            .query("pass_ticket", creds.pass_ticket())
            .json(with_base_request(
                creds,
                json!({
                    "Msg": {
                        "Type": MsgType::Text.code(),
                        "Content": content,
                        "FromUserName": from,
                        "ToUserName": to,
                        "LocalID": local_id,
                        "ClientMsgId": local_id,
                    },
                    "Scene": 0,
                }),
            ));
        let resp: SendMessageResponse = self.send_checked(req).await?;
        Ok(sent(resp, to, MsgType::Text.code(), content.to_string()))
    }

    /// Upload `data` to the file host in chunks; returns the media id of the
    /// final chunk.
    pub async fn upload_media(
        &self,
        creds: &Credentials,
        from: &str,
        to: &str,
        file_name: &str,
        data: Bytes,
    ) -> Result<UploadedMedia> {
        if data.is_empty() {
            return Err(SendError::EmptyMedia.into());
        }
        let mime = mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let kind = MediaKind::from_mime(&mime);
        let file_md5 = hex::encode(Md5::digest(&data));
        let total = data.len();
        let chunk_size = self.config.upload_chunk_size.max(1);
        let chunks = total.div_ceil(chunk_size);
        let client_media_id = generate_client_msg_id();
        let ticket = self.data_ticket();
        let upload_request = with_base_request(
            creds,
            json!({
                "UploadType": 2,
                "ClientMediaId": client_media_id,
                "TotalLen": total,
                "StartPos": 0,
                "DataLen": total,
                "MediaType": 4,
                "FromUserName": from,
                "ToUserName": to,
                "FileMd5": file_md5,
            }),
        )
        .to_string();

        let mut media_id = String::new();
        for (idx, start) in (0..total).step_by(chunk_size).enumerate() {
            let end = (start + chunk_size).min(total);
            let mut fields = vec![
                MultipartField::text("id", "WU_FILE_0"),
                MultipartField::text("name", file_name),
                MultipartField::text("type", mime.as_str()),
                MultipartField::text("lastModifiedDate", "Thu Jan 01 1970 08:00:00 GMT+0800"),
                MultipartField::text("size", total.to_string()),
            ];
            if chunks > 1 {
                fields.push(MultipartField::text("chunks", chunks.to_string()));
                fields.push(MultipartField::text("chunk", idx.to_string()));
            }
            fields.extend([
                MultipartField::text("mediatype", kind.upload_tag()),
                MultipartField::text("uploadmediarequest", upload_request.as_str()),
                MultipartField::text("webwx_data_ticket", ticket.as_str()),
                MultipartField::text("pass_ticket", creds.pass_ticket()),
                MultipartField::File {
                    name: "filename".to_string(),
                    file_name: file_name.to_string(),
                    mime: mime.clone(),
                    data: data.slice(start..end),
                },
            ]);
            let req = HttpRequest::post(creds.domain.file_url(endpoint::UPLOAD_MEDIA))
                .query("f", "json")
                .multipart(fields);
            let resp: UploadMediaResponse = self.send_checked(req).await?;
            tracing::debug!(chunk = idx, chunks, "media chunk uploaded");
            if !resp.media_id.is_empty() {
                media_id = resp.media_id;
            }
        }
        if media_id.is_empty() {
            return Err(crate::Error::Decode("upload finished without MediaId".into()));
        }
        Ok(UploadedMedia {
            media_id,
            file_name: file_name.to_string(),
            size: total,
            mime,
            kind,
        })
    }

    async fn send_media_msg(
        &self,
        creds: &Credentials,
        endpoint_name: &str,
        msg: serde_json::Value,
    ) -> Result<SendMessageResponse> {
        let req = HttpRequest::post(creds.domain.base_url(endpoint_name))
            .query("fun", "async")
            .query("f", "json")
            .query("lang", "zh_CN")
            .query("pass_ticket", creds.pass_ticket())
            .json(with_base_request(creds, json!({ "Msg": msg, "Scene": 0 })));
        self.send_checked(req).await
    }

    pub async fn send_image(
        &self,
        creds: &Credentials,
        from: &str,
        to: &str,
        media_id: &str,
    ) -> Result<SentMessage> {
        let local_id = generate_client_msg_id();
        let msg = json!({
            "Type": MsgType::Image.code(),
            "Content": "",
            "MediaId": media_id,
            "FromUserName": from,
            "ToUserName": to,
            "LocalID": local_id,
            "ClientMsgId": local_id,
        });
        let resp = self.send_media_msg(creds, endpoint::SEND_MSG_IMG, msg).await?;
        Ok(sent(resp, to, MsgType::Image.code(), String::new()))
    }

    pub async fn send_video(
        &self,
        creds: &Credentials,
        from: &str,
        to: &str,
        media_id: &str,
    ) -> Result<SentMessage> {
        let local_id = generate_client_msg_id();
        let msg = json!({
            "Type": MsgType::Video.code(),
            "Content": "",
            "MediaId": media_id,
            "FromUserName": from,
            "ToUserName": to,
            "LocalID": local_id,
            "ClientMsgId": local_id,
        });
        let resp = self.send_media_msg(creds, endpoint::SEND_VIDEO_MSG, msg).await?;
        Ok(sent(resp, to, MsgType::Video.code(), String::new()))
    }

    /// Send an uploaded file as an attachment app message.
    pub async fn send_file(
        &self,
        creds: &Credentials,
        from: &str,
        to: &str,
        media: &UploadedMedia,
    ) -> Result<SentMessage> {
        let content = format!(
            "<appmsg appid='{}' sdkver=''><title>{}</title><des></des><action></action><type>6</type><content></content><url></url><lowurl></lowurl><appattach><totallen>{}</totallen><attachid>{}</attachid><fileext>{}</fileext></appattach><extinfo></extinfo></appmsg>",
            APP_ID,
            quick_xml::escape::escape(media.file_name.as_str()),
            media.size,
            media.media_id,
            media.extension(),
        );
        self.send_structured(creds, from, to, &content).await
    }

    /// Send a raw `<appmsg>` document (link cards, attachments).
    pub async fn send_structured(
        &self,
        creds: &Credentials,
        from: &str,
        to: &str,
        content: &str,
    ) -> Result<SentMessage> {
        let local_id = generate_client_msg_id();
        let msg = json!({
            "Type": 6,
            "AppMsgType": 6,
            "Content": content,
            "FromUserName": from,
            "ToUserName": to,
            "LocalID": local_id,
            "ClientMsgId": local_id,
        });
        let resp = self.send_media_msg(creds, endpoint::SEND_APP_MSG, msg).await?;
        Ok(sent(resp, to, MsgType::App.code(), content.to_string()))
    }

    pub async fn revoke_message(&self, creds: &Credentials, sent: &SentMessage) -> Result<()> {
        let req = HttpRequest::post(creds.domain.base_url(endpoint::REVOKE_MSG))
            .query("lang", "zh_CN")
            .query("pass_ticket", creds.pass_ticket())
            .json(with_base_request(
                creds,
                json!({
                    "ClientMsgId": sent.local_id,
                    "SvrMsgId": sent.msg_id,
                    "ToUserName": sent.to_user_name,
                }),
            ));
        let _: BaseResponse = self.send_checked(req).await?;
        Ok(())
    }

    /// Download the media payload of an inbound message.
    pub async fn fetch_media(&self, creds: &Credentials, msg: &Message) -> Result<Bytes> {
        let req = match msg.msg_type() {
            MsgType::Image | MsgType::Emoticon => {
                HttpRequest::get(creds.domain.base_url(endpoint::GET_MSG_IMG))
                    .query("MsgID", &msg.msg_id)
                    .query("skey", creds.skey())
            }
            MsgType::Voice => HttpRequest::get(creds.domain.base_url(endpoint::GET_VOICE))
                .query("msgid", &msg.msg_id)
                .query("skey", creds.skey()),
            MsgType::Video | MsgType::MicroVideo => {
                HttpRequest::get(creds.domain.base_url(endpoint::GET_VIDEO))
                    .query("msgid", &msg.msg_id)
                    .query("skey", creds.skey())
                    .header("Range", "bytes=0-")
            }
            MsgType::App if !msg.media_id.is_empty() => {
                HttpRequest::get(creds.domain.file_url(endpoint::GET_MEDIA))
                    .query("sender", &msg.from_user_name)
                    .query("mediaid", &msg.media_id)
                    .query("encryfilename", &msg.encry_file_name)
                    .query("fromuser", creds.base_request.uin)
                    .query("pass_ticket", creds.pass_ticket())
                    .query("webwx_data_ticket", self.data_ticket())
            }
            _ => return Err(SendError::NoMedia.into()),
        };
        let req = req.timeout(self.config.long_poll_timeout());
        let resp = self.send(req).await?;
        tracing::debug!(msg_id = %msg.msg_id, len = resp.body.len(), "media fetched");
        Ok(resp.body)
    }
}
