use startup_finder_sync::browser::BrowserSession;
use startup_finder_sync::config::Config;
use startup_finder_sync::query::{ChromiumPage, PageQuery, SelectorMap};
use startup_finder_sync::services::Extractor;
use startup_finder_sync::utils::logging;
use startup_finder_sync::App;

#[tokio::test]
#[ignore] // 默认忽略，需要本地浏览器和完整环境变量：cargo test -- --ignored
async fn test_full_run() {
    logging::init(true);

    let config = Config::load().expect("加载配置失败");
    let summary = App::initialize(config)
        .await
        .expect("初始化失败")
        .run()
        .await
        .expect("运行失败");

    assert!(summary.is_done());
}

#[tokio::test]
#[ignore]
async fn test_browser_session_reads_start_page() {
    logging::init(true);

    let config = Config::default();
    let session = BrowserSession::open(&config.browser)
        .await
        .expect("应该能够打开浏览器");

    let page = ChromiumPage::new(
        session.page().cloned().expect("页面"),
        SelectorMap::new(&config.selectors),
        &config.browser,
    );
    page.goto(&config.start_url).await.expect("导航失败");
    page.wait_for_ready().await.expect("页面未就绪");

    let location = page.current_location().await.expect("读取地址失败");
    println!("当前地址: {}", location);

    let extractor = Extractor::new(&config.extract.schema).expect("查询语句无效");
    let records = extractor.extract(&page).await.expect("抽取失败");
    println!("抽取到 {} 条记录", records.len());

    session.close().await;
}
