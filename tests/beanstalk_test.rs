//! beanstalkd client against a scripted in-process server.

use beanstalk_worker::queue::{BeanstalkClient, Job, QueueClient, QueueError};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Accept one connection; answer each command line with the next scripted
/// reply. Returns the commands received (with `put` bodies appended).
async fn fake_server(replies: Vec<&'static str>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut read = BufReader::new(read);
        let mut received = Vec::new();

        for reply in replies {
            let mut line = String::new();
            if read.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            let mut command = line.trim_end().to_string();
            if let Some(len) = command
                .strip_prefix("put ")
                .and_then(|args| args.rsplit(' ').next())
                .and_then(|len| len.parse::<usize>().ok())
            {
                let mut body = vec![0u8; len + 2];
                read.read_exact(&mut body).await.unwrap();
                command.push('|');
                command.push_str(&String::from_utf8_lossy(&body[..len]));
            }
            received.push(command);
            write.write_all(reply.as_bytes()).await.unwrap();
        }
        received
    });

    (addr, handle)
}

#[tokio::test]
async fn watch_ignore_reserve_delete() {
    let (addr, server) = fake_server(vec![
        "WATCHING 2\r\n",
        "WATCHING 1\r\n",
        "RESERVED 7 5\r\nhello\r\n",
        "DELETED\r\n",
    ])
    .await;

    let mut client = BeanstalkClient::connect(&addr).await.unwrap();
    assert_eq!(client.watch("emails").await.unwrap(), 2);
    assert_eq!(client.ignore("default").await.unwrap(), 1);
    let job = client.reserve().await.unwrap();
    assert_eq!(job, Job::new(7, "hello"));
    client.delete(&job).await.unwrap();
    drop(client);

    assert_eq!(
        server.await.unwrap(),
        vec!["watch emails", "ignore default", "reserve", "delete 7"]
    );
}

#[tokio::test]
async fn reserved_body_is_read_by_length_not_by_line() {
    let (addr, _server) = fake_server(vec!["RESERVED 3 4\r\na\r\nb\r\n"]).await;

    let mut client = BeanstalkClient::connect(&addr).await.unwrap();
    let job = client.reserve().await.unwrap();

    assert_eq!(job.id, 3);
    assert_eq!(job.body, b"a\r\nb");
}

#[tokio::test]
async fn oversized_reserved_lengths_are_protocol_errors() {
    let (addr, _server) = fake_server(vec![
        "RESERVED 1 18446744073709551615\r\n",
        "RESERVED 2 2147483648\r\n",
    ])
    .await;

    let mut client = BeanstalkClient::connect(&addr).await.unwrap();

    for expected in ["RESERVED 1 18446744073709551615", "RESERVED 2 2147483648"] {
        match client.reserve().await {
            Err(QueueError::Protocol { command, reply }) => {
                assert_eq!(command, "reserve");
                assert_eq!(reply, expected);
            }
            other => panic!("expected protocol error, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn bury_uses_the_given_priority() {
    let (addr, server) = fake_server(vec!["BURIED\r\n", "NOT_FOUND\r\n"]).await;

    let mut client = BeanstalkClient::connect(&addr).await.unwrap();
    client.bury(&Job::new(9, ""), 1024).await.unwrap();
    let missing = client.bury(&Job::new(10, ""), 5).await;
    drop(client);

    assert!(matches!(missing, Err(QueueError::NotFound(10))));
    assert_eq!(server.await.unwrap(), vec!["bury 9 1024", "bury 10 5"]);
}

#[tokio::test]
async fn delete_of_unknown_job_is_not_found() {
    let (addr, _server) = fake_server(vec!["NOT_FOUND\r\n"]).await;

    let mut client = BeanstalkClient::connect(&addr).await.unwrap();
    let result = client.delete(&Job::new(4, "")).await;

    assert!(matches!(result, Err(QueueError::NotFound(4))));
}

#[tokio::test]
async fn ignoring_the_last_tube_is_refused() {
    let (addr, _server) = fake_server(vec!["NOT_IGNORED\r\n"]).await;

    let mut client = BeanstalkClient::connect(&addr).await.unwrap();

    assert!(matches!(
        client.ignore("default").await,
        Err(QueueError::NotIgnored)
    ));
}

#[tokio::test]
async fn deadline_soon_and_server_errors_surface() {
    let (addr, _server) = fake_server(vec!["DEADLINE_SOON\r\n", "OUT_OF_MEMORY\r\n"]).await;

    let mut client = BeanstalkClient::connect(&addr).await.unwrap();

    assert!(matches!(
        client.reserve().await,
        Err(QueueError::DeadlineSoon)
    ));
    match client.reserve().await {
        Err(QueueError::Server(reply)) => assert_eq!(reply, "OUT_OF_MEMORY"),
        other => panic!("expected server error, got {other:?}"),
    }
}

#[tokio::test]
async fn unexpected_reply_is_a_protocol_error() {
    let (addr, _server) = fake_server(vec!["WATCHING lots\r\n"]).await;

    let mut client = BeanstalkClient::connect(&addr).await.unwrap();

    assert!(matches!(
        client.watch("emails").await,
        Err(QueueError::Protocol { .. })
    ));
}

#[tokio::test]
async fn closed_connection_is_reported() {
    let (addr, _server) = fake_server(vec![]).await;

    let mut client = BeanstalkClient::connect(&addr).await.unwrap();

    let result = client.reserve().await;
    assert!(
        matches!(
            result,
            Err(QueueError::ConnectionClosed) | Err(QueueError::Io(_))
        ),
        "got {result:?}"
    );
}

#[tokio::test]
async fn invalid_tube_names_never_reach_the_server() {
    let (addr, server) = fake_server(vec!["WATCHING 2\r\n"]).await;

    let mut client = BeanstalkClient::connect(&addr).await.unwrap();
    assert!(matches!(
        client.watch("bad tube").await,
        Err(QueueError::InvalidTube(_))
    ));
    assert!(matches!(
        client.watch("-leading").await,
        Err(QueueError::InvalidTube(_))
    ));
    client.watch("good.tube").await.unwrap();
    drop(client);

    assert_eq!(server.await.unwrap(), vec!["watch good.tube"]);
}

#[tokio::test]
async fn use_and_put() {
    let (addr, server) = fake_server(vec!["USING jobs\r\n", "INSERTED 42\r\n"]).await;

    let mut client = BeanstalkClient::connect(&addr).await.unwrap();
    client.use_tube("jobs").await.unwrap();
    let id = client.put(b"payload", 100, 0, 60).await.unwrap();
    drop(client);

    assert_eq!(id, 42);
    assert_eq!(
        server.await.unwrap(),
        vec!["use jobs", "put 100 0 60 7|payload"]
    );
}

#[tokio::test]
async fn oversized_put_is_rejected() {
    let (addr, _server) = fake_server(vec!["JOB_TOO_BIG\r\n"]).await;

    let mut client = BeanstalkClient::connect(&addr).await.unwrap();

    assert!(matches!(
        client.put(b"big", 0, 0, 60).await,
        Err(QueueError::JobTooBig)
    ));
}
